//! Store abstraction for forensicstore containers.
//!
//! The [`Store`] trait is everything the plugin pipeline needs from an evidence
//! container: enumerate records of a type, insert records, and write file
//! blobs. [`SqliteStore`] is the on-disk implementation: a directory holding an
//! `item.db` SQLite database next to the stored files.

use crate::core::condition::{self, ConditionSet};
use crate::core::db;
use crate::core::error::{PluginError, Result};
use crate::core::record::Record;
use crate::core::schemas;
use crate::core::time;
use rusqlite::{Connection, params};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Lazy, forward-only sequence of records.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// A writable file inside the store. The writer is released when the slot is
/// dropped.
pub struct FileSlot<'a> {
    /// Path assigned by the store, relative to the store root.
    pub path: String,
    pub writer: Box<dyn Write + 'a>,
}

pub trait Store {
    /// All records of `record_type` in the store's native order.
    fn scan(&self, record_type: &str) -> Result<RecordStream<'_>>;

    /// Records of `record_type` satisfying `conditions`.
    fn select<'a>(
        &'a self,
        record_type: &str,
        conditions: &'a ConditionSet,
    ) -> Result<RecordStream<'a>> {
        let records = self.scan(record_type)?;
        Ok(Box::new(records.filter(move |item| match item {
            Ok(record) => condition::matches(record, conditions),
            Err(_) => true,
        })))
    }

    /// Insert a record and return its identifier.
    fn insert(&self, record: &Record) -> Result<String>;

    /// Insert unless a record with identical content already exists.
    fn insert_unique(&self, record: &Record) -> Result<Option<String>>;

    /// Reserve a new file at `relative_path`, or the closest free variant of it.
    fn store_file(&self, relative_path: &str) -> Result<FileSlot<'_>>;
}

/// SHA-256 over the record's JSON with object keys sorted.
pub fn content_hash(record: &Record) -> Result<String> {
    let canonical = canonicalize(&Value::Object(record.fields().clone()));
    let bytes = serde_json::to_vec(&canonical)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    root: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Create a new, empty store at `root`.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let conn = db::db_connect(&db::item_db_path(root), true)?;
        db::initialize_item_db(&conn)?;
        debug!(root = %root.display(), "created store");
        Ok(Self {
            root: root.to_path_buf(),
            conn,
        })
    }

    /// Open an existing store. Fails when `root` is not a store directory.
    pub fn connect(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PluginError::InvalidStore(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let db_path = db::item_db_path(root);
        if !db_path.is_file() {
            return Err(PluginError::InvalidStore(format!(
                "{} has no {}",
                root.display(),
                schemas::ITEM_DB_NAME
            )));
        }
        let invalid = |e: PluginError| {
            PluginError::InvalidStore(format!("{}: {}", db_path.display(), e))
        };
        let conn = db::db_connect(&db_path, false).map_err(invalid)?;
        if !db::has_records_table(&conn).map_err(invalid)? {
            return Err(PluginError::InvalidStore(format!(
                "{} has no {} table",
                db_path.display(),
                schemas::RECORDS_TABLE
            )));
        }
        debug!(root = %root.display(), "connected to store");
        Ok(Self {
            root: root.to_path_buf(),
            conn,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Close the underlying connection, reporting any error SQLite raises.
    pub fn close(self) -> Result<()> {
        let root = self.root;
        self.conn.close().map_err(|(_, e)| PluginError::RusqliteError(e))?;
        debug!(root = %root.display(), "closed store");
        Ok(())
    }

    fn insert_with_hash(&self, record: &Record, hash: &str) -> Result<String> {
        if record.record_type().is_empty() {
            return Err(PluginError::ValidationError(
                "refusing to insert a record without a type".to_string(),
            ));
        }
        let id = time::new_record_id();
        self.conn.execute(
            schemas::INSERT_RECORD_SQL,
            params![
                id,
                record.record_type(),
                hash,
                record.to_json()?,
                time::now_epoch_z()
            ],
        )?;
        Ok(id)
    }
}

impl Store for SqliteStore {
    fn scan(&self, record_type: &str) -> Result<RecordStream<'_>> {
        Ok(Box::new(PagedCursor {
            conn: &self.conn,
            record_type: record_type.to_string(),
            last_rowid: 0,
            page: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn insert(&self, record: &Record) -> Result<String> {
        let hash = content_hash(record)?;
        self.insert_with_hash(record, &hash)
    }

    fn insert_unique(&self, record: &Record) -> Result<Option<String>> {
        let hash = content_hash(record)?;
        let exists: bool = self.conn.query_row(
            schemas::HASH_EXISTS_SQL,
            params![record.record_type(), hash],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(None);
        }
        self.insert_with_hash(record, &hash).map(Some)
    }

    fn store_file(&self, relative_path: &str) -> Result<FileSlot<'_>> {
        let relative = checked_relative(relative_path)?;
        let (assigned, file) = create_free_file(&self.root, &relative)?;
        let path = assigned
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(FileSlot {
            path,
            writer: Box::new(file),
        })
    }
}

/// Keyset-paginated cursor over one record type.
struct PagedCursor<'a> {
    conn: &'a Connection,
    record_type: String,
    last_rowid: i64,
    page: VecDeque<(i64, String)>,
    exhausted: bool,
}

impl PagedCursor<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(schemas::SELECT_PAGE_SQL)?;
        let rows = stmt.query_map(
            params![self.record_type, self.last_rowid, schemas::SELECT_PAGE_SIZE],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )?;
        let mut fetched = Vec::new();
        for row in rows {
            fetched.push(row?);
        }
        self.page.extend(fetched);
        if (self.page.len() as i64) < schemas::SELECT_PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for PagedCursor<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let (rowid, json) = self.page.pop_front()?;
        self.last_rowid = rowid;
        Some(
            serde_json::from_str::<Value>(&json)
                .map_err(PluginError::from)
                .and_then(Record::from_value),
        )
    }
}

fn checked_relative(relative_path: &str) -> Result<PathBuf> {
    let path = Path::new(relative_path);
    let clean = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if relative_path.is_empty() || !clean {
        return Err(PluginError::ConfigError(format!(
            "store file path '{}' must be relative and stay inside the store",
            relative_path
        )));
    }
    Ok(path.to_path_buf())
}

/// Create `relative` under `root`; on collision try `<stem>_<n>.<ext>`.
fn create_free_file(root: &Path, relative: &Path) -> Result<(PathBuf, File)> {
    if let Some(parent) = relative.parent() {
        fs::create_dir_all(root.join(parent))?;
    }
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = relative
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut candidate = relative.to_path_buf();
    let mut n = 0;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(root.join(&candidate))
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                n += 1;
                candidate.set_file_name(format!("{}_{}{}", stem, n, ext));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Open the store at `root`, run `f`, and close the store on every path.
///
/// An error from `f` takes precedence over an error raised while closing.
pub fn with_store<F, R>(root: &Path, f: F) -> Result<R>
where
    F: FnOnce(&SqliteStore) -> Result<R>,
{
    let store = SqliteStore::connect(root)?;
    let result = f(&store);
    let closed = store.close();
    match (result, closed) {
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "store close failed after run error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Ok(value), Ok(())) => Ok(value),
    }
}
