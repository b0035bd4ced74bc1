use forensicstore_plugins::core::condition::ConditionSet;
use forensicstore_plugins::core::error::PluginError;
use forensicstore_plugins::core::record::{REPORT_TYPE, Record};
use forensicstore_plugins::core::render::{self, RenderConfig, Renderer, TeraRenderer};
use forensicstore_plugins::core::runner::{self, Plugin, RunOptions};
use forensicstore_plugins::core::select;
use forensicstore_plugins::core::store::{SqliteStore, Store};
use forensicstore_plugins::plugins::report::ReportPlugin;
use serde_json::json;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).expect("valid record")
}

fn read_report(store_dir: &Path, report_path: &str) -> String {
    fs::read_to_string(store_dir.join(report_path)).expect("read report")
}

fn seed_runkeys(root: &Path, n: usize) {
    let store = SqliteStore::create(root).expect("create");
    for i in 0..n {
        store
            .insert(&record(json!({
                "Key": "HKEY_USERS\\S-1\\Software\\Microsoft\\Windows\\CurrentVersion\\Run",
                "Command": format!("C:\\tool{}.exe", i),
                "Name": format!("Tool{}", i),
                "SID": "S-1",
                "type": "runkey"
            })))
            .expect("insert");
    }
    store.close().expect("close");
}

struct CountingRenderer {
    calls: Cell<usize>,
}

impl Renderer for CountingRenderer {
    fn render(&self, _template_name: &str, items: &[Record]) -> Result<String, PluginError> {
        self.calls.set(self.calls.get() + 1);
        Ok(format!("{} items\n", items.len()))
    }
}

#[test]
fn empty_items_render_nothing_and_write_nothing() {
    let tmp = tempdir().expect("tempdir");
    let store = SqliteStore::create(tmp.path()).expect("create");
    let renderer = CountingRenderer { calls: Cell::new(0) };
    let report = render::render_report(&store, &renderer, &[], "runkeys.md").expect("render");
    assert!(report.is_none());
    assert_eq!(renderer.calls.get(), 0);
    assert!(!tmp.path().join(render::REPORTS_DIR).exists());
}

#[test]
fn report_record_points_at_stored_markdown() {
    let tmp = tempdir().expect("tempdir");
    let store = SqliteStore::create(tmp.path()).expect("create");
    let renderer = CountingRenderer { calls: Cell::new(0) };
    let items = vec![record(json!({"type": "usb-device"}))];
    let report = render::render_report(&store, &renderer, &items, "usb.html")
        .expect("render")
        .expect("some report");

    assert_eq!(report.record_type(), REPORT_TYPE);
    assert_eq!(report.get("format"), Some(&json!("markdown")));
    let path = report.get("report_path").and_then(|v| v.as_str()).unwrap();
    assert!(path.starts_with("Reports/"));
    assert!(path.ends_with(".md"));
    assert_eq!(read_report(tmp.path(), path), "1 items\n");
}

#[test]
fn run_renders_bundled_runkeys_template() {
    let tmp = tempdir().expect("tempdir");
    seed_runkeys(tmp.path(), 2);
    let plugin = ReportPlugin::new(
        "runkey",
        "runkeys.md",
        ConditionSet::any(),
        &RenderConfig::bundled(),
    )
    .expect("plugin");
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary = runner::run_plugin(&plugin, &options).expect("run");
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.inserted, 1);

    let store = SqliteStore::connect(tmp.path()).expect("connect");
    let reports = select::select_all(&store, REPORT_TYPE, &ConditionSet::any()).expect("select");
    assert_eq!(reports.len(), 1);
    let path = reports[0].get("report_path").and_then(|v| v.as_str()).unwrap();
    assert_eq!(path, "Reports/runkeys.md");
    let text = read_report(tmp.path(), path);
    assert!(text.contains("| Tool0 | C:\\tool0.exe | S-1 |"));
    assert!(text.contains("Tool1"));
}

#[test]
fn run_with_no_matching_items_inserts_no_report() {
    let tmp = tempdir().expect("tempdir");
    seed_runkeys(tmp.path(), 1);
    let plugin = ReportPlugin::new(
        "usb-device",
        "records.md",
        ConditionSet::any(),
        &RenderConfig::bundled(),
    )
    .expect("plugin");
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary = runner::run_plugin(&plugin, &options).expect("run");
    assert_eq!(summary.inserted, 0);
    let store = SqliteStore::connect(tmp.path()).expect("connect");
    assert_eq!(store.scan(REPORT_TYPE).expect("scan").count(), 0);
}

#[test]
fn custom_template_folder_and_filters() {
    let tmp = tempdir().expect("tempdir");
    let store_dir = tmp.path().join("case.forensicstore");
    seed_runkeys(&store_dir, 3);
    let templates = tmp.path().join("templates");
    fs::create_dir_all(&templates).expect("mkdir");
    fs::write(
        templates.join("names.txt"),
        "{% for item in data %}{{ item.Name }};{% endfor %}",
    )
    .expect("write template");

    let filters = ConditionSet::parse_filters(&["Name=Tool2", "Name=Tool0"]).expect("filters");
    let plugin =
        ReportPlugin::new("runkey", "names.txt", filters, &RenderConfig::new(&templates))
            .expect("plugin");
    let options = RunOptions {
        store: store_dir.clone(),
        dedupe: false,
    };
    runner::run_plugin(&plugin, &options).expect("first run");
    runner::run_plugin(&plugin, &options).expect("second run");

    let store = SqliteStore::connect(&store_dir).expect("connect");
    let paths: Vec<String> = select::select_all(&store, REPORT_TYPE, &ConditionSet::any())
        .expect("select")
        .iter()
        .map(|r| r.get("report_path").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, ["Reports/names.md", "Reports/names_1.md"]);
    assert_eq!(
        read_report(&store_dir, &paths[0]),
        "Tool0;Tool2;"
    );
}

#[test]
fn tera_renderer_exposes_items_as_data() {
    let renderer = TeraRenderer::new(&RenderConfig::bundled()).expect("renderer");
    let items = vec![
        record(json!({"type": "usb-device", "vendor": "acme"})),
        record(json!({"type": "usb-device", "vendor": "globex"})),
    ];
    let text = renderer.render("records.md", &items).expect("render");
    assert!(text.starts_with("# usb-device records"));
    assert!(text.contains("2 records selected."));
    assert!(text.contains("**vendor**: globex"));
}

#[test]
fn plugin_metadata() {
    let plugin = ReportPlugin::new(
        "runkey",
        "runkeys.md",
        ConditionSet::any(),
        &RenderConfig::bundled(),
    )
    .expect("plugin");
    let info = plugin.describe();
    assert_eq!(info.name, "report");
    assert!(!info.short.is_empty());
}
