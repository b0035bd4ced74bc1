use crate::core::error;
use crate::core::schemas;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Open an SQLite connection with the pragmas every store connection uses.
///
/// With `create == false` the database file must already exist.
pub fn db_connect(db_path: &Path, create: bool) -> Result<Connection, error::PluginError> {
    let flags = if create {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(db_path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::PluginError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::PluginError::RusqliteError)?;
    Ok(conn)
}

pub fn item_db_path(root: &Path) -> PathBuf {
    root.join(schemas::ITEM_DB_NAME)
}

pub fn initialize_item_db(conn: &Connection) -> Result<(), error::PluginError> {
    conn.execute(schemas::RECORDS_SCHEMA, [])?;
    conn.execute(schemas::RECORDS_TYPE_INDEX, [])?;
    conn.execute(schemas::RECORDS_HASH_INDEX, [])?;
    Ok(())
}

pub fn has_records_table(conn: &Connection) -> Result<bool, error::PluginError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [schemas::RECORDS_TABLE],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}
