//! Report rendering.
//!
//! [`TeraRenderer`] renders a named template against a list of records. The
//! template set is the bundled defaults overlaid with every file found under
//! [`RenderConfig::search_path`]. [`render_report`] stores the output as a
//! markdown file inside the store and returns the `report` record describing it.

use crate::core::error::{PluginError, Result};
use crate::core::record::{Record, Report};
use crate::core::store::Store;
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, warn};

/// Folder inside the store that receives rendered reports.
pub const REPORTS_DIR: &str = "Reports";

/// Template variable holding the selected records.
pub const ITEMS_VARIABLE: &str = "data";

#[derive(RustEmbed)]
#[folder = "templates/"]
struct BundledTemplates;

/// Template engine settings, fixed for the lifetime of a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Root folder searched for templates, on top of the bundled ones.
    pub search_path: Option<PathBuf>,
    /// HTML-escape every interpolated value.
    pub autoescape: bool,
}

impl RenderConfig {
    pub fn new(search_path: impl Into<PathBuf>) -> Self {
        Self {
            search_path: Some(search_path.into()),
            autoescape: true,
        }
    }

    pub fn bundled() -> Self {
        Self {
            search_path: None,
            autoescape: true,
        }
    }
}

pub trait Renderer {
    /// Render `template_name` with `items` bound to the `data` variable.
    fn render(&self, template_name: &str, items: &[Record]) -> Result<String>;
}

pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let mut sources = bundled_templates()?;
        if let Some(root) = &config.search_path {
            if !root.is_dir() {
                return Err(PluginError::ConfigError(format!(
                    "template folder {} does not exist",
                    root.display()
                )));
            }
            collect_templates(root, root, &mut sources)?;
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources.iter().map(|(n, s)| (n.as_str(), s.as_str())))?;
        if config.autoescape {
            // An empty suffix matches every template name.
            tera.autoescape_on(vec![""]);
        } else {
            tera.autoescape_on(vec![]);
        }
        debug!(templates = sources.len(), "loaded report templates");
        Ok(Self { tera })
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(String::from).collect();
        names.sort();
        names
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, template_name: &str, items: &[Record]) -> Result<String> {
        if !self.tera.get_template_names().any(|n| n == template_name) {
            return Err(PluginError::TemplateNotFound(template_name.to_string()));
        }
        let mut context = Context::new();
        context.insert(ITEMS_VARIABLE, items);
        Ok(self.tera.render(template_name, &context)?)
    }
}

fn bundled_templates() -> Result<BTreeMap<String, String>> {
    let mut sources = BTreeMap::new();
    for name in BundledTemplates::iter() {
        let Some(file) = BundledTemplates::get(&name) else {
            continue;
        };
        let text = String::from_utf8(file.data.into_owned()).map_err(|e| {
            PluginError::ConfigError(format!("bundled template {} is not UTF-8: {}", name, e))
        })?;
        sources.insert(name.to_string(), text);
    }
    Ok(sources)
}

/// Load every UTF-8 file below `dir`, named by its `/`-separated path relative
/// to `root`.
fn collect_templates(
    root: &Path,
    dir: &Path,
    sources: &mut BTreeMap<String, String>,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_templates(root, &path, sources)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match fs::read_to_string(&path) {
            Ok(text) => {
                sources.insert(name, text);
            }
            Err(e) => warn!(template = %path.display(), error = %e, "skipping unreadable template"),
        }
    }
    Ok(())
}

/// `Reports/<stem>.md`, where `<stem>` is the template's file name up to its
/// first dot. Folders in the template name are kept.
pub fn report_file_name(template_name: &str) -> Result<String> {
    let (folder, file) = match template_name.rsplit_once('/') {
        Some((folder, file)) => (Some(folder), file),
        None => (None, template_name),
    };
    let stem = file.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return Err(PluginError::ConfigError(format!(
            "cannot derive a report name from template '{}'",
            template_name
        )));
    }
    Ok(match folder {
        Some(folder) => format!("{}/{}/{}.md", REPORTS_DIR, folder, stem),
        None => format!("{}/{}.md", REPORTS_DIR, stem),
    })
}

/// Render `items` with `template_name` and store the result as a report file.
///
/// Returns `None` without touching the renderer or the store when `items` is
/// empty.
pub fn render_report(
    store: &dyn Store,
    renderer: &dyn Renderer,
    items: &[Record],
    template_name: &str,
) -> Result<Option<Record>> {
    if items.is_empty() {
        debug!(template = template_name, "no items, skipping report");
        return Ok(None);
    }
    let output = renderer.render(template_name, items)?;
    let file_name = report_file_name(template_name)?;

    let report_path = {
        let mut slot = store.store_file(&file_name)?;
        slot.writer.write_all(output.as_bytes())?;
        slot.writer.flush()?;
        slot.path
    };
    debug!(path = %report_path, bytes = output.len(), "stored report");
    Record::from_shape(&Report::markdown(report_path)).map(Some)
}
