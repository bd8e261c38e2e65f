//! SQLite database module
//!
//! Backs both platform stores the worker relies on: the versioned Cache
//! Store and the Local Offline Store. Each call holds the connection lock
//! for one statement or transaction, so writers never interleave.

pub mod models;
mod cache;
mod meta;
mod migrations;
mod offline;

use crate::error::Result;
use crate::net::Response;
pub use models::{CacheBucket, OfflineRecord};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        Self::with_connection(conn)
    }

    /// Database that lives only as long as the process
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Cache Store Methods ==========

    pub fn open_bucket(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        cache::open_bucket(&conn, name)
    }

    pub fn has_bucket(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        cache::has_bucket(&conn, name)
    }

    pub fn bucket_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        cache::bucket_names(&conn)
    }

    pub fn list_buckets(&self) -> Result<Vec<CacheBucket>> {
        let conn = self.conn.lock();
        cache::list_buckets(&conn)
    }

    /// Delete a bucket with all its entries
    pub fn delete_bucket(&self, name: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        cache::delete_bucket(&mut conn, name)
    }

    pub fn put_entry(&self, bucket: &str, url: &str, response: &Response) -> Result<()> {
        let mut conn = self.conn.lock();
        cache::put_entry(&mut conn, bucket, url, response)
    }

    pub fn match_entry(&self, bucket: &str, url: &str) -> Result<Option<Response>> {
        let conn = self.conn.lock();
        cache::match_entry(&conn, bucket, url)
    }

    pub fn bucket_keys(&self, bucket: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        cache::bucket_keys(&conn, bucket)
    }

    // ========== Offline Store Methods ==========

    pub fn upsert_record(&self, id: &str, payload: &Value) -> Result<()> {
        let mut conn = self.conn.lock();
        offline::upsert_records(&mut conn, &[(id.to_string(), payload.clone())])?;
        Ok(())
    }

    /// Upsert a batch atomically
    pub fn upsert_records(&self, records: &[(String, Value)]) -> Result<usize> {
        let mut conn = self.conn.lock();
        offline::upsert_records(&mut conn, records)
    }

    pub fn get_record(&self, id: &str) -> Result<Option<OfflineRecord>> {
        let conn = self.conn.lock();
        offline::get_record(&conn, id)
    }

    pub fn all_records(&self) -> Result<Vec<OfflineRecord>> {
        let conn = self.conn.lock();
        offline::all_records(&conn)
    }

    pub fn record_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        offline::record_count(&conn)
    }

    // ========== Worker Meta Methods ==========

    pub fn active_version(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        meta::active_version(&conn)
    }

    pub fn set_active_version(&self, version: &str) -> Result<()> {
        let conn = self.conn.lock();
        meta::set_active_version(&conn, version)
    }
}
