//! Cache Store: versioned request -> response buckets

use crate::db::sqlite::models::CacheBucket;
use crate::error::Result;
use crate::net::Response;
use rusqlite::{params, Connection, OptionalExtension};

/// Create the bucket if it does not exist yet
pub fn open_bucket(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
        [name],
    )?;
    Ok(())
}

pub fn has_bucket(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_buckets WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn bucket_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY created_at, name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn list_buckets(conn: &Connection) -> Result<Vec<CacheBucket>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, COUNT(e.url), b.created_at
         FROM cache_buckets b
         LEFT JOIN cache_entries e ON e.bucket = b.name
         GROUP BY b.name
         ORDER BY b.created_at, b.name",
    )?;
    let buckets = stmt
        .query_map([], |row| {
            Ok(CacheBucket {
                name: row.get(0)?,
                entries: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(buckets)
}

/// Delete a bucket and its entries; returns whether it existed
pub fn delete_bucket(conn: &mut Connection, name: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM cache_entries WHERE bucket = ?", [name])?;
    let deleted = tx.execute("DELETE FROM cache_buckets WHERE name = ?", [name])?;
    tx.commit()?;
    Ok(deleted > 0)
}

/// Store a response under the exact request URL
pub fn put_entry(conn: &mut Connection, bucket: &str, url: &str, response: &Response) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
        [bucket],
    )?;
    tx.execute(
        "INSERT INTO cache_entries (bucket, url, status, headers, body)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(bucket, url) DO UPDATE SET
            status = excluded.status,
            headers = excluded.headers,
            body = excluded.body,
            cached_at = datetime('now')",
        params![bucket, url, response.status, headers, response.body],
    )?;
    tx.commit()?;
    Ok(())
}

/// Exact-URL lookup
pub fn match_entry(conn: &Connection, bucket: &str, url: &str) -> Result<Option<Response>> {
    let row = conn
        .query_row(
            "SELECT status, headers, body FROM cache_entries WHERE bucket = ?1 AND url = ?2",
            params![bucket, url],
            |row| {
                Ok((
                    row.get::<_, u16>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((status, headers, body)) => Ok(Some(Response {
            status,
            headers: serde_json::from_str(&headers)?,
            body,
        })),
        None => Ok(None),
    }
}

pub fn bucket_keys(conn: &Connection, bucket: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE bucket = ? ORDER BY url")?;
    let keys = stmt
        .query_map([bucket], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(keys)
}
