//! Worker metadata

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

const ACTIVE_VERSION_KEY: &str = "active_version";

pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM worker_meta WHERE key = ?", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO worker_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        [key, value],
    )?;
    Ok(())
}

/// Version of the last worker that completed activation
pub fn active_version(conn: &Connection) -> Result<Option<String>> {
    get_value(conn, ACTIVE_VERSION_KEY)
}

pub fn set_active_version(conn: &Connection, version: &str) -> Result<()> {
    set_value(conn, ACTIVE_VERSION_KEY, version)
}
