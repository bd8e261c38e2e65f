//! Local Offline Store: records persisted by background sync

use crate::db::sqlite::models::OfflineRecord;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;

/// Insert or replace records in a single transaction.
///
/// Returns the number of distinct ids written; a repeated id keeps its
/// last payload.
pub fn upsert_records(conn: &mut Connection, records: &[(String, Value)]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO offline_records (id, payload) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = datetime('now')",
        )?;
        for (id, payload) in records {
            stmt.execute(params![id, serde_json::to_string(payload)?])?;
        }
    }
    tx.commit()?;

    let distinct: HashSet<&str> = records.iter().map(|(id, _)| id.as_str()).collect();
    Ok(distinct.len())
}

pub fn get_record(conn: &Connection, id: &str) -> Result<Option<OfflineRecord>> {
    let row = conn
        .query_row(
            "SELECT id, payload, updated_at FROM offline_records WHERE id = ?",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, payload, updated_at)) => Ok(Some(OfflineRecord {
            id,
            payload: serde_json::from_str(&payload)?,
            updated_at,
        })),
        None => Ok(None),
    }
}

pub fn all_records(conn: &Connection) -> Result<Vec<OfflineRecord>> {
    let mut stmt = conn.prepare("SELECT id, payload, updated_at FROM offline_records ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, payload, updated_at)| {
            Ok(OfflineRecord {
                id,
                payload: serde_json::from_str(&payload)?,
                updated_at,
            })
        })
        .collect()
}

pub fn record_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM offline_records", [], |row| row.get(0))?;
    Ok(count)
}
