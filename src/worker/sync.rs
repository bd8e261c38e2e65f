//! Background sync: refresh signal data into the Local Offline Store

use super::WorkerContext;
use crate::error::{AppError, Result};
use crate::net::Request;
use serde_json::Value;

/// Envelope keys the backend wraps its lists in
const LIST_KEYS: &[&str] = &["opportunities", "exit_signals", "portfolio", "results"];

/// Run the sync task for `tag`; returns how many records were stored.
///
/// Only the configured tag does any work. Not retried here: rescheduling
/// belongs to whoever fires the sync.
pub async fn handle_sync(ctx: &WorkerContext, tag: &str) -> Result<usize> {
    if tag != ctx.config.sync_tag {
        tracing::debug!("Ignoring sync tag '{}'", tag);
        return Ok(0);
    }

    let url = ctx.config.backend(&ctx.config.sync_endpoint)?;
    let request = Request::get(url).with_header("Content-Type", "application/json");
    let response = ctx.network.fetch(&request).await?;
    if !response.is_ok() {
        return Err(AppError::Api(format!(
            "sync fetch returned status {}",
            response.status
        )));
    }

    let records = extract_records(response.json()?);
    let stored = ctx.db.upsert_records(&records)?;
    tracing::info!("Background sync stored {} record(s)", stored);
    Ok(stored)
}

/// Flatten a backend payload into `(id, record)` pairs
pub(crate) fn extract_records(payload: Value) -> Vec<(String, Value)> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            // An object carrying its own id is a record, not an envelope
            let envelope = if map.contains_key("id") || map.contains_key("symbol") {
                None
            } else {
                LIST_KEYS
                    .iter()
                    .find(|key| matches!(map.get(**key), Some(Value::Array(_))))
            };
            match envelope.and_then(|key| map.remove(*key)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match record_id(&item) {
            Some(id) => Some((id, item)),
            None => {
                tracing::warn!("Skipping sync record without id");
                None
            }
        })
        .collect()
}

fn record_id(record: &Value) -> Option<String> {
    let id = record.get("id").or_else(|| record.get("symbol"))?;
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::worker::testing::{harness, url};
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_stores_single_record() {
        let h = harness(Config::default());
        h.network.respond_json(&url("/api/squeeze-opportunities"), json!({"id": "AMC", "score": 81}));

        let stored = handle_sync(&h.ctx, "background-sync").await.unwrap();

        assert_eq!(stored, 1);
        assert_eq!(h.ctx.db.record_count().unwrap(), 1);
        let record = h.ctx.db.get_record("AMC").unwrap().unwrap();
        assert_eq!(record.payload, json!({"id": "AMC", "score": 81}));
    }

    #[tokio::test]
    async fn test_unknown_tag_does_nothing() {
        let h = harness(Config::default());
        assert_eq!(handle_sync(&h.ctx, "periodic-refresh").await.unwrap(), 0);
        assert_eq!(h.network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_persists_nothing() {
        let h = harness(Config::default());
        h.network.fail(&url("/api/squeeze-opportunities"));

        assert!(handle_sync(&h.ctx, "background-sync").await.is_err());
        assert_eq!(h.ctx.db.record_count().unwrap(), 0);
    }

    #[test]
    fn test_extract_envelope() {
        let records = extract_records(json!({
            "opportunities": [
                {"symbol": "GME", "squeeze_score": 90},
                {"symbol": "AMC", "squeeze_score": 81},
                {"squeeze_score": 10}
            ]
        }));
        let ids: Vec<&str> = records.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["GME", "AMC"]);
    }

    #[test]
    fn test_extract_numeric_id() {
        let records = extract_records(json!([{"id": 7}]));
        assert_eq!(records[0].0, "7");
        assert!(extract_records(json!("nope")).is_empty());
    }
}
