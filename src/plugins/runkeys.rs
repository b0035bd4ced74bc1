//! `runkeys`: extract autostart entries from Windows registry Run keys.
//!
//! Selects the `windows-registry-key` items below the well-known Run, RunOnce,
//! RunOnceEx and Policies\Explorer\Run locations (machine-wide and for every
//! user hive) and emits one `runkey` item per registry value.

use crate::core::condition::{self, Condition, ConditionSet};
use crate::core::error::Result;
use crate::core::logging;
use crate::core::record::{REGISTRY_KEY_TYPE, Record, RecordKind, RegistryValue, RunKey};
use crate::core::runner::{self, Plugin, PluginInfo, Processed, RunOptions, StoreArgs};
use crate::core::select;
use crate::core::store::Store;
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

pub const NAME: &str = "runkeys";
pub const SHORT: &str = "Process windows run keys";

const HKLM_SOFTWARE: &str = "HKEY_LOCAL_MACHINE\\Software\\";
const HKU_SOFTWARE: &str = "HKEY_USERS\\%\\Software\\";

const RUN_KEY_SUFFIXES: &[&str] = &[
    "Microsoft\\Windows\\CurrentVersion\\Policies\\Explorer\\Run",
    "Microsoft\\Windows\\CurrentVersion\\Run",
    "Microsoft\\Windows\\CurrentVersion\\RunOnce",
    "Microsoft\\Windows\\CurrentVersion\\RunOnce\\Setup",
    "Microsoft\\Windows\\CurrentVersion\\RunOnceEx",
    "Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\Policies\\Explorer\\Run",
    "Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\Run",
    "Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\RunOnce",
    "Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\RunOnce\\Setup",
    "Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\RunOnceEx",
];

/// `forensicstore-runkeys [OPTIONS]` runs the plugin; `info` and `run` are
/// explicit spellings of the two modes.
#[derive(Parser, Debug)]
#[clap(
    name = "forensicstore-runkeys",
    version = env!("CARGO_PKG_VERSION"),
    about = "Extract Windows run keys from a forensicstore.",
    args_conflicts_with_subcommands = true
)]
pub struct RunkeysCli {
    #[clap(subcommand)]
    pub command: Option<RunkeysCommand>,
    #[clap(flatten)]
    pub run: RunkeysArgs,
}

#[derive(Subcommand, Debug)]
pub enum RunkeysCommand {
    /// Print plugin metadata as JSON.
    Info,
    /// Select run keys and insert one `runkey` item per value.
    Run(RunkeysArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunkeysArgs {
    #[clap(flatten)]
    pub store: StoreArgs,
    /// Narrow the selection, e.g. `--filter Name=Updater`. Repeat to OR.
    #[clap(long = "filter")]
    pub filters: Vec<String>,
}

/// Every autostart location, machine-wide first, then per user hive.
pub fn run_key_locations() -> Vec<String> {
    [HKLM_SOFTWARE, HKU_SOFTWARE]
        .iter()
        .flat_map(|root| RUN_KEY_SUFFIXES.iter().map(move |s| format!("{}{}", root, s)))
        .collect()
}

pub fn run_key_conditions() -> ConditionSet {
    run_key_locations()
        .into_iter()
        .map(|location| Condition::new().with(condition::PATH_FIELD, location))
        .collect()
}

/// Output of [`transform`].
#[derive(Debug, Default, PartialEq)]
pub struct Transformed {
    pub derived: Vec<Record>,
    pub diagnostics: Vec<String>,
}

/// Derive one `runkey` record per value of each registry key.
///
/// Keys without `values` contribute nothing. Keys whose path has no second
/// segment, and values without `name`/`data`, are skipped with a diagnostic.
pub fn transform(records: &[Record]) -> Transformed {
    let mut out = Transformed::default();
    for record in records {
        let key = match RecordKind::classify(record) {
            Ok(RecordKind::RegistryKey(key)) => key,
            Ok(_) => {
                out.diagnostics.push(format!(
                    "expected a {} item, got '{}'",
                    REGISTRY_KEY_TYPE,
                    record.record_type()
                ));
                continue;
            }
            Err(e) => {
                out.diagnostics.push(e.to_string());
                continue;
            }
        };
        let Some(values) = &key.values else {
            continue;
        };
        let Some(sid) = key.key.split(condition::PATH_SEPARATOR).nth(1) else {
            out.diagnostics
                .push(format!("key '{}' has no second path segment", key.key));
            continue;
        };
        for value in values {
            let entry: RegistryValue = match serde_json::from_value(value.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    out.diagnostics
                        .push(format!("value of key '{}' is malformed: {}", key.key, e));
                    continue;
                }
            };
            let derived = RunKey::new(&key.key, entry.data, &entry.name, sid);
            match Record::from_shape(&derived) {
                Ok(record) => out.derived.push(record),
                Err(e) => out.diagnostics.push(e.to_string()),
            }
        }
    }
    out
}

pub struct RunkeysPlugin {
    conditions: ConditionSet,
}

impl RunkeysPlugin {
    pub fn new() -> Self {
        Self {
            conditions: run_key_conditions(),
        }
    }

    /// Restrict the fixed run key locations with user conditions.
    pub fn with_filters(filters: &ConditionSet) -> Self {
        Self {
            conditions: run_key_conditions().combine(filters),
        }
    }
}

impl Default for RunkeysPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for RunkeysPlugin {
    fn describe(&self) -> PluginInfo {
        PluginInfo {
            name: NAME.to_string(),
            short: SHORT.to_string(),
        }
    }

    fn source_type(&self) -> &str {
        REGISTRY_KEY_TYPE
    }

    fn select(&self, store: &dyn Store) -> Result<Vec<Record>> {
        select::select_all(store, REGISTRY_KEY_TYPE, &self.conditions)
    }

    fn process(&self, _store: &dyn Store, selected: &[Record]) -> Result<Processed> {
        let Transformed {
            derived,
            diagnostics,
        } = transform(selected);
        Ok(Processed {
            results: derived,
            diagnostics,
        })
    }
}

pub fn run_runkeys_cli(cli: RunkeysCli) -> ExitCode {
    match cli.command {
        Some(RunkeysCommand::Info) => {
            let plugin = RunkeysPlugin::new();
            runner::finish(&plugin, runner::print_info(&plugin))
        }
        Some(RunkeysCommand::Run(args)) => run(args),
        None => run(cli.run),
    }
}

fn run(args: RunkeysArgs) -> ExitCode {
    logging::init_logging(args.store.verbose);
    let outcome = ConditionSet::parse_filters(&args.filters).and_then(|filters| {
        let plugin = RunkeysPlugin::with_filters(&filters);
        runner::run_plugin(&plugin, &RunOptions::from(&args.store)).map(|_| ())
    });
    runner::finish(&RunkeysPlugin::new(), outcome)
}
