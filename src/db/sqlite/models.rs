//! SQLite database models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cache bucket summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBucket {
    pub name: String,
    pub entries: i64,
    pub created_at: String,
}

/// Record persisted by background sync
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfflineRecord {
    pub id: String,
    pub payload: Value,
    pub updated_at: String,
}
