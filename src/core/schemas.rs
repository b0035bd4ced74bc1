//! Schema of the `item.db` database inside a forensicstore directory.
//!
//! Records are stored as JSON documents keyed by a ULID. The implicit SQLite
//! `rowid` gives the native enumeration order used by the select cursor.

pub const ITEM_DB_NAME: &str = "item.db";

pub const RECORDS_TABLE: &str = "records";

pub const RECORDS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        json TEXT NOT NULL,
        inserted_at TEXT NOT NULL
    )
";
pub const RECORDS_TYPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_type ON records(type)";
pub const RECORDS_HASH_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_content_hash ON records(type, content_hash)";

pub const SELECT_PAGE_SQL: &str = "
    SELECT rowid, json FROM records
    WHERE type = ?1 AND rowid > ?2
    ORDER BY rowid
    LIMIT ?3
";
pub const INSERT_RECORD_SQL: &str = "
    INSERT INTO records (id, type, content_hash, json, inserted_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
";
pub const HASH_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM records WHERE type = ?1 AND content_hash = ?2)";

/// Rows fetched per round trip by the select cursor.
pub const SELECT_PAGE_SIZE: i64 = 256;
