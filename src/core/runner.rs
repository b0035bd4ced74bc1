//! Plugin invocation lifecycle.
//!
//! `info` prints the plugin's metadata and never touches a store. `run` opens
//! the store, lets the plugin select and process records, inserts the results
//! and closes the store on every exit path.

use crate::core::error::{PluginError, Result};
use crate::core::record::Record;
use crate::core::store::{self, Store};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

/// Self-description printed by `<plugin> info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    #[serde(rename = "Use")]
    pub name: String,
    #[serde(rename = "Short")]
    pub short: String,
}

/// What a plugin hands back to the runner for insertion.
#[derive(Debug, Default)]
pub struct Processed {
    pub results: Vec<Record>,
    /// Malformed inputs that were skipped.
    pub diagnostics: Vec<String>,
}

pub trait Plugin {
    fn describe(&self) -> PluginInfo;

    /// Type of the records the plugin selects. Results must use another type.
    fn source_type(&self) -> &str;

    /// Pull the plugin's input records out of `store`.
    fn select(&self, store: &dyn Store) -> Result<Vec<Record>>;

    /// Derive results from the selected records. Must not write to the store
    /// except for file blobs referenced by the results.
    fn process(&self, store: &dyn Store, selected: &[Record]) -> Result<Processed>;
}

/// Options shared by every plugin's `run` subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Forensicstore directory (defaults to the current working directory).
    #[clap(long, default_value = ".")]
    pub store: PathBuf,
    /// Skip results whose content is already in the store.
    #[clap(long)]
    pub dedupe: bool,
    /// Log debug output to stderr.
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub store: PathBuf,
    pub dedupe: bool,
}

impl From<&StoreArgs> for RunOptions {
    fn from(args: &StoreArgs) -> Self {
        Self {
            store: args.store.clone(),
            dedupe: args.dedupe,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Connected,
    Selected,
    Processed,
    Inserted,
    Closed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Connected => "connected",
            RunState::Selected => "selected",
            RunState::Processed => "processed",
            RunState::Inserted => "inserted",
            RunState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Write the plugin's metadata as a single JSON line.
pub fn write_info(plugin: &dyn Plugin, out: &mut dyn Write) -> Result<()> {
    let payload = serde_json::to_string(&plugin.describe())?;
    writeln!(out, "{}", payload)?;
    Ok(())
}

pub fn print_info(plugin: &dyn Plugin) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_info(plugin, &mut lock)
}

/// Run `plugin` against the store at `options.store`.
pub fn run_plugin(plugin: &dyn Plugin, options: &RunOptions) -> Result<RunSummary> {
    let name = plugin.describe().name;
    let summary = store::with_store(&options.store, |store| {
        debug!(plugin = %name, state = %RunState::Connected, "store open");
        let selected = plugin.select(store)?;
        debug!(
            plugin = %name,
            state = %RunState::Selected,
            selected = selected.len(),
            "selection done"
        );
        let processed = plugin.process(store, &selected)?;
        debug!(
            plugin = %name,
            state = %RunState::Processed,
            results = processed.results.len(),
            "processing done"
        );
        let mut summary =
            insert_results(store, plugin.source_type(), processed, options.dedupe)?;
        summary.selected = selected.len();
        debug!(plugin = %name, state = %RunState::Inserted, "results written");
        Ok(summary)
    })?;
    debug!(plugin = %name, state = %RunState::Closed, "store released");
    info!(
        plugin = %name,
        selected = summary.selected,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "run complete"
    );
    Ok(summary)
}

fn insert_results(
    store: &dyn Store,
    source_type: &str,
    processed: Processed,
    dedupe: bool,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        skipped: processed.diagnostics.len(),
        ..RunSummary::default()
    };
    for diagnostic in &processed.diagnostics {
        warn!("skipped malformed record: {}", diagnostic);
    }
    for result in &processed.results {
        if result.record_type() == source_type {
            return Err(PluginError::ValidationError(format!(
                "derived record reuses the source type '{}'",
                source_type
            )));
        }
        if dedupe {
            match store.insert_unique(result)? {
                Some(_) => summary.inserted += 1,
                None => summary.duplicates += 1,
            }
        } else {
            store.insert(result)?;
            summary.inserted += 1;
        }
    }
    Ok(summary)
}

/// Map a plugin outcome to the process exit status, logging any failure.
pub fn finish(plugin: &dyn Plugin, outcome: Result<()>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = if e.is_config() { 2 } else { 1 };
            let err = anyhow::Error::new(e).context(format!("{} failed", plugin.describe().name));
            error!("{:#}", err);
            ExitCode::from(code)
        }
    }
}
