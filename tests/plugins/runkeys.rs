use forensicstore_plugins::core::condition::ConditionSet;
use forensicstore_plugins::core::record::{REGISTRY_KEY_TYPE, RUNKEY_TYPE, Record};
use forensicstore_plugins::core::runner::{self, RunOptions};
use forensicstore_plugins::core::select;
use forensicstore_plugins::core::store::{SqliteStore, Store};
use forensicstore_plugins::plugins::runkeys::{self, RunkeysPlugin};
use serde_json::json;
use std::path::Path;
use tempfile::tempdir;

const USER_RUN: &str =
    "HKEY_USERS\\S-1-5-21-000\\Software\\Microsoft\\Windows\\CurrentVersion\\Run";
const MACHINE_RUN_ONCE: &str =
    "HKEY_LOCAL_MACHINE\\Software\\Microsoft\\Windows\\CurrentVersion\\RunOnce";

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).expect("valid record")
}

fn seed(root: &Path) {
    let store = SqliteStore::create(root).expect("create");
    let items = [
        json!({"type": REGISTRY_KEY_TYPE, "key": USER_RUN, "values": [
            {"name": "Updater", "data": "C:\\u.exe"}
        ]}),
        json!({"type": REGISTRY_KEY_TYPE, "key": MACHINE_RUN_ONCE, "values": [
            {"name": "Setup", "data": "C:\\setup.exe /q"},
            {"name": "Cleanup", "data": "C:\\clean.exe"}
        ]}),
        // Matching location without values.
        json!({"type": REGISTRY_KEY_TYPE, "key": "HKEY_LOCAL_MACHINE\\Software\\Microsoft\\Windows\\CurrentVersion\\RunOnceEx"}),
        // Not a run key.
        json!({"type": REGISTRY_KEY_TYPE, "key": "HKEY_USERS\\S-1-5-21-000\\Software\\Classes", "values": [
            {"name": "x", "data": "y"}
        ]}),
        // Same path but a different item type.
        json!({"type": "usb-device", "key": USER_RUN}),
    ];
    for item in items {
        store.insert(&record(item)).expect("insert");
    }
    store.close().expect("close");
}

fn runkeys_in(root: &Path) -> Vec<Record> {
    let store = SqliteStore::connect(root).expect("connect");
    let items = select::select_all(&store, RUNKEY_TYPE, &ConditionSet::any()).expect("select");
    store.close().expect("close");
    items
}

#[test]
fn user_run_key_scenario() {
    let input = vec![record(json!({
        "type": REGISTRY_KEY_TYPE,
        "key": USER_RUN,
        "values": [{"name": "Updater", "data": "C:\\u.exe"}]
    }))];
    let out = runkeys::transform(&input);
    assert_eq!(
        out.derived,
        vec![record(json!({
            "Key": USER_RUN,
            "Command": "C:\\u.exe",
            "Name": "Updater",
            "SID": "S-1-5-21-000",
            "type": "runkey"
        }))]
    );
}

#[test]
fn run_derives_one_item_per_value() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary = runner::run_plugin(&RunkeysPlugin::new(), &options).expect("run");
    assert_eq!(summary.selected, 3);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.skipped, 0);

    let items = runkeys_in(tmp.path());
    let names: Vec<&str> = items
        .iter()
        .map(|r| r.get("Name").and_then(|v| v.as_str()).unwrap())
        .collect();
    assert_eq!(names, ["Updater", "Setup", "Cleanup"]);
    assert_eq!(items[1].get("SID"), Some(&json!("Software")));
}

#[test]
fn rerun_duplicates_unless_deduped() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    let mut options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    runner::run_plugin(&RunkeysPlugin::new(), &options).expect("first run");
    runner::run_plugin(&RunkeysPlugin::new(), &options).expect("second run");
    assert_eq!(runkeys_in(tmp.path()).len(), 6);

    options.dedupe = true;
    let summary = runner::run_plugin(&RunkeysPlugin::new(), &options).expect("third run");
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.duplicates, 3);
    assert_eq!(runkeys_in(tmp.path()).len(), 6);
}

#[test]
fn empty_store_completes_without_writes() {
    let tmp = tempdir().expect("tempdir");
    SqliteStore::create(tmp.path())
        .expect("create")
        .close()
        .expect("close");
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary = runner::run_plugin(&RunkeysPlugin::new(), &options).expect("run");
    assert_eq!(summary.selected, 0);
    assert_eq!(summary.inserted, 0);
    assert!(runkeys_in(tmp.path()).is_empty());
}

#[test]
fn malformed_keys_are_skipped_not_fatal() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    {
        let store = SqliteStore::connect(tmp.path()).expect("connect");
        store
            .insert(&record(json!({
                "type": REGISTRY_KEY_TYPE,
                "key": USER_RUN,
                "values": [{"name": "NoData"}]
            })))
            .expect("insert");
        store.close().expect("close");
    }
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary = runner::run_plugin(&RunkeysPlugin::new(), &options).expect("run");
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.inserted, 3);
}

#[test]
fn filters_narrow_the_selection() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    let filters = ConditionSet::parse_filters(&[format!("key={}", USER_RUN)]).expect("filters");
    let options = RunOptions {
        store: tmp.path().to_path_buf(),
        dedupe: false,
    };
    let summary =
        runner::run_plugin(&RunkeysPlugin::with_filters(&filters), &options).expect("run");
    assert_eq!(summary.selected, 1);
    assert_eq!(runkeys_in(tmp.path()).len(), 1);
}
