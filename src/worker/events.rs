//! Worker event loop
//!
//! Events arrive over an mpsc channel and each carries a oneshot reply: the
//! reply is the "work to await" before the caller may proceed. The
//! dispatcher hands each event type to its own serial lane, so two events
//! of the same type never overlap while different types interleave at
//! their suspension points. Fetches are spawned individually, and state
//! queries are answered by the dispatcher itself.

use super::activate::{self, ActivateReport};
use super::fetch::{self, FetchResult};
use super::install::{self, InstallReport};
use super::lifecycle::{Lifecycle, LifecycleEvent, WorkerState};
use super::push::{self, ClickOutcome};
use super::sync;
use super::WorkerContext;
use crate::error::{AppError, Result};
use crate::net::Request;
use crate::notify::Notification;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Platform event delivered to the worker
pub enum WorkerEvent {
    Install {
        reply: oneshot::Sender<Result<InstallReport>>,
    },
    Activate {
        reply: oneshot::Sender<Result<ActivateReport>>,
    },
    Fetch {
        request: Request,
        reply: oneshot::Sender<Result<FetchResult>>,
    },
    Push {
        payload: Option<Vec<u8>>,
        reply: oneshot::Sender<Result<Notification>>,
    },
    Sync {
        tag: String,
        reply: oneshot::Sender<Result<usize>>,
    },
    NotificationClick {
        notification_id: Option<String>,
        action: String,
        reply: oneshot::Sender<Result<ClickOutcome>>,
    },
    State {
        reply: oneshot::Sender<WorkerState>,
    },
    /// A newer version took over; the loop ends after this
    Supersede {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Serial queue for one event type
type Lane = mpsc::UnboundedSender<WorkerEvent>;

/// Worker state shared by the dispatcher and its lanes
struct Shared {
    ctx: Arc<WorkerContext>,
    version: String,
    lifecycle: Mutex<Lifecycle>,
}

impl Shared {
    fn transition(&self, state: WorkerState) -> Result<()> {
        self.lifecycle.lock().transition(state)
    }

    fn state(&self) -> WorkerState {
        self.lifecycle.lock().state()
    }

    async fn handle(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Install { reply } => {
                let _ = reply.send(self.on_install().await);
            }
            WorkerEvent::Activate { reply } => {
                let _ = reply.send(self.on_activate().await);
            }
            WorkerEvent::Push { payload, reply } => {
                let result = push::handle_push(&self.ctx, payload.as_deref()).await;
                if let Err(e) = &result {
                    tracing::error!("Failed to show push notification: {}", e);
                }
                let _ = reply.send(result);
            }
            WorkerEvent::Sync { tag, reply } => {
                let result = sync::handle_sync(&self.ctx, &tag).await;
                if let Err(e) = &result {
                    tracing::error!("Background sync '{}' failed: {}", tag, e);
                }
                let _ = reply.send(result);
            }
            WorkerEvent::NotificationClick {
                notification_id,
                action,
                reply,
            } => {
                let result = push::handle_notification_click(
                    &self.ctx,
                    notification_id.as_deref(),
                    &action,
                )
                .await;
                if let Err(e) = &result {
                    tracing::error!("Notification click '{}' failed: {}", action, e);
                }
                let _ = reply.send(result);
            }
            // Answered by the dispatcher
            WorkerEvent::Fetch { .. } | WorkerEvent::State { .. } | WorkerEvent::Supersede { .. } => {}
        }
    }

    async fn on_install(&self) -> Result<InstallReport> {
        self.transition(WorkerState::Installing)?;

        let report = match install::install(&self.ctx).await {
            Ok(report) => report,
            Err(e) => {
                // Install never fails outright; an empty bucket is still usable
                tracing::error!("Install of {} failed: {}", self.version, e);
                InstallReport {
                    version: self.version.clone(),
                    ..Default::default()
                }
            }
        };

        self.transition(WorkerState::Installed)?;
        Ok(report)
    }

    async fn on_activate(&self) -> Result<ActivateReport> {
        self.transition(WorkerState::Activating)?;
        let mut report = activate::purge_stale_buckets(&self.ctx);
        self.transition(WorkerState::Active)?;

        activate::claim_clients(&self.ctx, &mut report).await;
        self.lifecycle.lock().controller_change()?;
        Ok(report)
    }
}

/// One worker version and its event loop
pub struct ServiceWorker {
    shared: Arc<Shared>,
    receiver: mpsc::Receiver<WorkerEvent>,
}

impl ServiceWorker {
    /// Start the event loop on the tokio runtime
    pub fn spawn(ctx: Arc<WorkerContext>, lifecycle: Lifecycle) -> WorkerHandle {
        let (sender, receiver) = mpsc::channel(256);
        let version = lifecycle.version().to_string();
        let handle = WorkerHandle {
            version: version.clone(),
            sender,
            lifecycle_events: lifecycle.sender(),
        };

        let worker = Self {
            shared: Arc::new(Shared {
                ctx,
                version,
                lifecycle: Mutex::new(lifecycle),
            }),
            receiver,
        };
        tokio::spawn(worker.run());

        handle
    }

    /// Start a lane task; it ends once the dispatcher drops the sender
    fn lane(&self) -> Lane {
        let (lane, mut events) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                shared.handle(event).await;
            }
        });
        lane
    }

    async fn run(mut self) {
        tracing::info!("Worker {} started", self.shared.version);

        let lifecycle_lane = self.lane();
        let push_lane = self.lane();
        let sync_lane = self.lane();
        let click_lane = self.lane();

        while let Some(event) = self.receiver.recv().await {
            match event {
                WorkerEvent::Fetch { request, reply } => {
                    let ctx = self.shared.ctx.clone();
                    let controlled = self.shared.lifecycle.lock().is_active();
                    tokio::spawn(async move {
                        let result = if controlled {
                            fetch::handle_fetch(&ctx, &request).await
                        } else {
                            fetch::passthrough(&ctx, &request).await
                        };
                        let _ = reply.send(result);
                    });
                }
                WorkerEvent::State { reply } => {
                    let _ = reply.send(self.shared.state());
                }
                WorkerEvent::Supersede { reply } => {
                    let result = self.shared.transition(WorkerState::Superseded);
                    let done = result.is_ok();
                    let _ = reply.send(result);
                    if done {
                        break;
                    }
                }
                event @ (WorkerEvent::Install { .. } | WorkerEvent::Activate { .. }) => {
                    self.forward(&lifecycle_lane, event)
                }
                event @ WorkerEvent::Push { .. } => self.forward(&push_lane, event),
                event @ WorkerEvent::Sync { .. } => self.forward(&sync_lane, event),
                event @ WorkerEvent::NotificationClick { .. } => self.forward(&click_lane, event),
            }
        }

        tracing::info!("Worker {} stopped", self.shared.version);
    }

    fn forward(&self, lane: &Lane, event: WorkerEvent) {
        // A dropped event drops its reply, which the caller sees as unavailable
        if lane.send(event).is_err() {
            tracing::warn!("Worker {} lane closed, event dropped", self.shared.version);
        }
    }
}

/// Cloneable front for dispatching events to a worker
#[derive(Clone)]
pub struct WorkerHandle {
    version: String,
    sender: mpsc::Sender<WorkerEvent>,
    lifecycle_events: broadcast::Sender<LifecycleEvent>,
}

impl WorkerHandle {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_events.subscribe()
    }

    async fn dispatch<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> WorkerEvent,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| AppError::WorkerUnavailable)?;
        response.await.map_err(|_| AppError::WorkerUnavailable)
    }

    pub async fn install(&self) -> Result<InstallReport> {
        self.dispatch(|reply| WorkerEvent::Install { reply }).await?
    }

    pub async fn activate(&self) -> Result<ActivateReport> {
        self.dispatch(|reply| WorkerEvent::Activate { reply }).await?
    }

    pub async fn fetch(&self, request: Request) -> Result<FetchResult> {
        self.dispatch(|reply| WorkerEvent::Fetch { request, reply })
            .await?
    }

    pub async fn push(&self, payload: Option<Vec<u8>>) -> Result<Notification> {
        self.dispatch(|reply| WorkerEvent::Push { payload, reply })
            .await?
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<usize> {
        let tag = tag.into();
        self.dispatch(|reply| WorkerEvent::Sync { tag, reply }).await?
    }

    pub async fn notification_click(
        &self,
        notification_id: Option<String>,
        action: impl Into<String>,
    ) -> Result<ClickOutcome> {
        let action = action.into();
        self.dispatch(|reply| WorkerEvent::NotificationClick {
            notification_id,
            action,
            reply,
        })
        .await?
    }

    pub async fn state(&self) -> Result<WorkerState> {
        self.dispatch(|reply| WorkerEvent::State { reply }).await
    }

    pub async fn supersede(&self) -> Result<()> {
        self.dispatch(|reply| WorkerEvent::Supersede { reply })
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::net::{Method, Response};
    use crate::worker::fetch::FetchSource;
    use crate::worker::testing::{harness, url};
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn small_config() -> Config {
        Config {
            asset_manifest: vec!["/".to_string(), "/app.js".to_string()],
            offline_shell: "/".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_install_with_failing_asset_then_activate() {
        let h = harness(small_config());
        h.network.respond(&url("/"), Response::new(200, "shell"));
        h.network.fail(&url("/app.js"));
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::new("squeeze-tracker-v1"));

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, vec!["/".to_string()]);
        assert_eq!(worker.state().await.unwrap(), WorkerState::Installed);

        worker.activate().await.unwrap();
        assert_eq!(worker.state().await.unwrap(), WorkerState::Active);
        assert_eq!(h.ctx.db.bucket_keys("squeeze-tracker-v1").unwrap(), vec![url("/")]);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_is_not_intercepted() {
        let h = harness(small_config());
        h.ctx.db.put_entry("squeeze-tracker-v1", &url("/"), &Response::new(200, "cached")).unwrap();
        h.network.respond(&url("/"), Response::new(200, "live"));
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::new("squeeze-tracker-v1"));

        let result = worker.fetch(Request::get(Url::parse(&url("/")).unwrap())).await.unwrap();
        assert_eq!(result.source, FetchSource::Passthrough);
        assert_eq!(result.response.text(), "live");
    }

    #[tokio::test]
    async fn test_resumed_worker_serves_cache() {
        let h = harness(small_config());
        h.ctx.db.put_entry("squeeze-tracker-v1", &url("/"), &Response::new(200, "cached")).unwrap();
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));

        let result = worker.fetch(Request::get(Url::parse(&url("/")).unwrap())).await.unwrap();
        assert_eq!(result.source, FetchSource::Cache);
        assert_eq!(h.network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let h = harness(small_config());
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::new("squeeze-tracker-v1"));
        assert!(matches!(worker.activate().await, Err(AppError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_sync_push_and_click_through_loop() {
        let h = harness(small_config());
        h.network.respond_json(&url("/api/squeeze-opportunities"), json!({"id": "AMC", "score": 81}));
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));

        assert_eq!(worker.sync("background-sync").await.unwrap(), 1);

        let shown = worker.push(None).await.unwrap();
        let outcome = worker
            .notification_click(Some(shown.id), "explore")
            .await
            .unwrap();
        assert!(matches!(outcome, ClickOutcome::Opened(ref w) if w.url.as_str() == "http://localhost:8000/?tab=buy"));
    }

    #[tokio::test]
    async fn test_superseded_worker_stops() {
        let h = harness(small_config());
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));
        let mut events = worker.subscribe();

        worker.supersede().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            LifecycleEvent::StateChange { new_state: WorkerState::Superseded, .. }
        ));
        assert!(matches!(worker.state().await, Err(AppError::WorkerUnavailable)));
    }

    #[tokio::test]
    async fn test_slow_sync_does_not_hold_up_fetches() {
        let h = harness(small_config());
        h.ctx.db.put_entry("squeeze-tracker-v1", &url("/app.js"), &Response::new(200, "bundle")).unwrap();
        h.network.respond_after(
            &url("/api/squeeze-opportunities"),
            Duration::from_secs(2),
            Response::new(200, r#"{"id": "AMC"}"#),
        );
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));

        let syncing = worker.clone();
        let sync = tokio::spawn(async move { syncing.sync("background-sync").await });
        tokio::task::yield_now().await;

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            worker.fetch(Request::get(Url::parse(&url("/app.js")).unwrap())),
        )
        .await
        .expect("cache hit waited for the sync")
        .unwrap();
        assert_eq!(result.source, FetchSource::Cache);

        let push = tokio::time::timeout(Duration::from_millis(500), worker.push(None)).await;
        assert!(push.is_ok());
        assert!(!sync.is_finished());
    }

    #[tokio::test]
    async fn test_same_type_events_stay_in_order() {
        let h = harness(small_config());
        h.network.respond_after(
            &url("/api/squeeze-opportunities"),
            Duration::from_millis(200),
            Response::new(200, r#"[{"id": "AMC"}, {"id": "GME"}]"#),
        );
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));

        let first = worker.clone();
        let first = tokio::spawn(async move { first.sync("background-sync").await });
        tokio::task::yield_now().await;
        let second = worker.sync("background-sync").await.unwrap();

        // The second sync only starts once the first has stored its records
        assert!(first.is_finished());
        assert_eq!(first.await.unwrap().unwrap(), 2);
        assert_eq!(second, 2);
        assert_eq!(h.network.call_count(), 2);
    }

    #[tokio::test]
    async fn test_post_is_forwarded_untouched() {
        let h = harness(small_config());
        h.network.respond(&url("/api/portfolio/add"), Response::new(200, "{}"));
        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::resumed("squeeze-tracker-v1"));

        let request = Request::get(Url::parse(&url("/api/portfolio/add")).unwrap())
            .with_method(Method::Post);
        let result = worker.fetch(request).await.unwrap();
        assert_eq!(result.source, FetchSource::Passthrough);
        assert!(h.ctx.db.bucket_keys("squeeze-tracker-v1").unwrap().is_empty());
    }
}
