//! Snapshot subscriptions
//!
//! A source yields a lazy, infinite stream of full snapshots for one panel.
//! Every `subscribe` call starts a fresh stream, so a consumer restarts a
//! subscription simply by subscribing again.

use super::state::PanelKind;
use crate::error::Result;
use crate::net::BackendClient;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::time::Duration;

/// Complete content of one panel at a point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub panel: PanelKind,
    pub items: Vec<Value>,
    pub received_at: DateTime<Utc>,
}

pub type SnapshotStream = BoxStream<'static, Result<Snapshot>>;

pub trait SnapshotSource: Send + Sync {
    fn panel(&self) -> PanelKind;

    fn subscribe(&self) -> SnapshotStream;
}

/// Polls a backend collection on a fixed interval
pub struct PollingSource {
    client: BackendClient,
    panel: PanelKind,
    interval: Duration,
}

impl PollingSource {
    pub fn new(client: BackendClient, panel: PanelKind, interval: Duration) -> Self {
        Self {
            client,
            panel,
            interval,
        }
    }

    /// Fetch the panel's collection once
    pub async fn fetch_once(client: &BackendClient, panel: PanelKind) -> Result<Snapshot> {
        let items = match panel {
            PanelKind::Portfolio => client.portfolio().await?,
            PanelKind::Opportunities => client.squeeze_opportunities().await?,
            PanelKind::ExitSignals => client.exit_signals().await?,
        };
        Ok(Snapshot {
            panel,
            items,
            received_at: Utc::now(),
        })
    }
}

impl SnapshotSource for PollingSource {
    fn panel(&self) -> PanelKind {
        self.panel
    }

    fn subscribe(&self) -> SnapshotStream {
        let client = self.client.clone();
        let panel = self.panel;
        let interval = self.interval;

        // First snapshot immediately, then one per interval
        stream::unfold(true, move |first| {
            let client = client.clone();
            async move {
                if !first {
                    tokio::time::sleep(interval).await;
                }
                let snapshot = Self::fetch_once(&client, panel).await;
                Some((snapshot, false))
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::MockNetwork;
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    fn source(network: Arc<MockNetwork>, panel: PanelKind) -> PollingSource {
        let client = BackendClient::new(network, Url::parse("http://backend.test").unwrap());
        PollingSource::new(client, panel, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_stream_yields_repeatedly() {
        let network = Arc::new(MockNetwork::new());
        network.respond_json(
            "http://backend.test/api/exit-signals",
            json!({"exit_signals": [{"symbol": "GME", "urgency": 90}]}),
        );

        let snapshots: Vec<_> = source(network.clone(), PanelKind::ExitSignals)
            .subscribe()
            .take(3)
            .collect()
            .await;

        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|s| s.as_ref().unwrap().items.len() == 1));
        assert_eq!(network.call_count(), 3);
    }

    #[tokio::test]
    async fn test_errors_do_not_end_stream() {
        let network = Arc::new(MockNetwork::new());
        network.fail("http://backend.test/api/portfolio");

        let mut stream = source(network.clone(), PanelKind::Portfolio).subscribe();
        assert!(stream.next().await.unwrap().is_err());

        network.respond_json("http://backend.test/api/portfolio", json!({"portfolio": []}));
        assert!(stream.next().await.unwrap().is_ok());
    }
}
