//! `report`: render the selected items of one type into a markdown report.

use crate::core::condition::ConditionSet;
use crate::core::error::{PluginError, Result};
use crate::core::logging;
use crate::core::record::{REPORT_TYPE, Record};
use crate::core::render::{self, RenderConfig, Renderer, TeraRenderer};
use crate::core::runner::{self, Plugin, PluginInfo, Processed, RunOptions, StoreArgs};
use crate::core::select;
use crate::core::store::Store;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub const NAME: &str = "report";
pub const SHORT: &str = "Generate markdown reports";

/// Folder next to the executable searched for templates by default.
pub const TEMPLATES_DIR: &str = "templates";

/// `forensicstore-report <TYPE> <TEMPLATE> [OPTIONS]` runs the plugin; `info`
/// and `run` are explicit spellings of the two modes.
#[derive(Parser, Debug)]
#[clap(
    name = "forensicstore-report",
    version = env!("CARGO_PKG_VERSION"),
    about = "Render forensicstore items into markdown reports.",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct ReportCli {
    #[clap(subcommand)]
    pub command: Option<ReportCommand>,
    #[clap(flatten)]
    pub run: ReportArgs,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Print plugin metadata as JSON.
    Info,
    /// Render all items of a type with a template and store the report.
    Run(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Item type to select, e.g. `runkey`.
    #[clap(required = true)]
    pub record_type: Option<String>,
    /// Template to render, e.g. `runkeys.md`.
    #[clap(required = true)]
    pub template: Option<String>,
    #[clap(flatten)]
    pub store: StoreArgs,
    /// Template folder (defaults to `templates/` next to the executable).
    #[clap(long)]
    pub templates: Option<PathBuf>,
    /// Only report items matching `field=value[,field=value]`. Repeat to OR.
    #[clap(long = "filter")]
    pub filters: Vec<String>,
}

/// Template folder next to the running executable, if there is one.
pub fn default_template_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.join(TEMPLATES_DIR);
    dir.is_dir().then_some(dir)
}

pub struct ReportPlugin<R: Renderer> {
    record_type: String,
    template: String,
    conditions: ConditionSet,
    renderer: R,
}

impl ReportPlugin<TeraRenderer> {
    /// Build the plugin and its renderer. Fails before any store is opened when
    /// the type or template is unusable.
    pub fn new(
        record_type: &str,
        template: &str,
        conditions: ConditionSet,
        config: &RenderConfig,
    ) -> Result<Self> {
        let renderer = TeraRenderer::new(config)?;
        if !renderer.template_names().iter().any(|n| n == template) {
            return Err(PluginError::TemplateNotFound(template.to_string()));
        }
        Self::with_renderer(record_type, template, conditions, renderer)
    }
}

impl<R: Renderer> ReportPlugin<R> {
    pub fn with_renderer(
        record_type: &str,
        template: &str,
        conditions: ConditionSet,
        renderer: R,
    ) -> Result<Self> {
        if record_type.is_empty() {
            return Err(PluginError::ConfigError(
                "record type must not be empty".to_string(),
            ));
        }
        if record_type == REPORT_TYPE {
            return Err(PluginError::ConfigError(
                "cannot build a report from report items".to_string(),
            ));
        }
        render::report_file_name(template)?;
        Ok(Self {
            record_type: record_type.to_string(),
            template: template.to_string(),
            conditions,
            renderer,
        })
    }
}

impl<R: Renderer> Plugin for ReportPlugin<R> {
    fn describe(&self) -> PluginInfo {
        describe()
    }

    fn source_type(&self) -> &str {
        &self.record_type
    }

    fn select(&self, store: &dyn Store) -> Result<Vec<Record>> {
        select::select_all(store, &self.record_type, &self.conditions)
    }

    fn process(&self, store: &dyn Store, selected: &[Record]) -> Result<Processed> {
        let report = render::render_report(store, &self.renderer, selected, &self.template)?;
        Ok(Processed {
            results: report.into_iter().collect(),
            diagnostics: Vec::new(),
        })
    }
}

pub fn describe() -> PluginInfo {
    PluginInfo {
        name: NAME.to_string(),
        short: SHORT.to_string(),
    }
}

/// Stand-in used for `info` and error reporting, where no renderer is needed.
struct ReportInfo;

impl Plugin for ReportInfo {
    fn describe(&self) -> PluginInfo {
        describe()
    }

    fn source_type(&self) -> &str {
        ""
    }

    fn select(&self, _store: &dyn Store) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    fn process(&self, _store: &dyn Store, _selected: &[Record]) -> Result<Processed> {
        Ok(Processed::default())
    }
}

pub fn run_report_cli(cli: ReportCli) -> ExitCode {
    match cli.command {
        Some(ReportCommand::Info) => runner::finish(&ReportInfo, runner::print_info(&ReportInfo)),
        Some(ReportCommand::Run(args)) => run(args),
        None => run(cli.run),
    }
}

fn run(args: ReportArgs) -> ExitCode {
    logging::init_logging(args.store.verbose);
    let (Some(record_type), Some(template)) = (&args.record_type, &args.template) else {
        let err = PluginError::ConfigError("expected <TYPE> <TEMPLATE>".to_string());
        return runner::finish(&ReportInfo, Err(err));
    };
    let config = match args.templates.clone().or_else(default_template_root) {
        Some(root) => RenderConfig::new(root),
        None => RenderConfig::bundled(),
    };
    let outcome = ConditionSet::parse_filters(&args.filters)
        .and_then(|conditions| ReportPlugin::new(record_type, template, conditions, &config))
        .and_then(|plugin| {
            runner::run_plugin(&plugin, &RunOptions::from(&args.store)).map(|_| ())
        });
    runner::finish(&ReportInfo, outcome)
}
