//! Local HTTP front for the worker
//!
//! Stands where the browser's fetch routing would: page requests are
//! dispatched to the active worker as fetch events, and the `/_worker`
//! routes deliver push, sync and notification-click events.

pub mod handlers;

pub use handlers::ShellState;

use crate::error::{AppError, Result};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// HTTP server wrapping the worker
pub struct ShellServer {
    state: Arc<ShellState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl ShellServer {
    pub fn new(state: ShellState) -> Self {
        Self {
            state: Arc::new(state),
            shutdown_tx: None,
            local_addr: None,
        }
    }

    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/_worker/push", post(handlers::push))
            .route("/_worker/sync/:tag", post(handlers::sync))
            .route("/_worker/notificationclick", post(handlers::notification_click))
            .route("/_worker/state", get(handlers::worker_state))
            .route("/_worker/dashboard", get(handlers::dashboard))
            .route("/_worker/dashboard/search", get(handlers::dashboard_search))
            .route("/_worker/dashboard/refresh/:panel", post(handlers::dashboard_refresh))
            .route("/_worker/dashboard/scan", post(handlers::dashboard_scan))
            .route("/_worker/dashboard/monitor", post(handlers::dashboard_monitor))
            .route("/_worker/dashboard/portfolio", post(handlers::dashboard_add))
            .route(
                "/_worker/dashboard/portfolio/:symbol",
                delete(handlers::dashboard_remove),
            )
            .fallback(handlers::intercept)
            .with_state(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background; returns the bound address
    pub async fn start(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        if self.is_running() {
            info!("Shell server already running");
            self.stop();
        }

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Shell server shutting down");
            });

            if let Err(e) = server.await {
                error!("Shell server error: {}", e);
            }
        });

        info!("Serving worker {} on http://{}", self.state.worker.version(), local_addr);
        info!("  POST http://{}/_worker/push", local_addr);
        info!("  POST http://{}/_worker/sync/{}", local_addr, self.state.config.sync_tag);
        info!("  POST http://{}/_worker/notificationclick", local_addr);
        info!("  GET  http://{}/_worker/state", local_addr);

        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Shell server stop signal sent");
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ShellServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dashboard::{DashboardController, Tab};
    use crate::net::testing::MockNetwork;
    use crate::net::{BackendClient, Response};
    use crate::worker::testing::{harness, url, Harness};
    use crate::worker::{Lifecycle, ServiceWorker};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Install and activate a worker behind a server on an ephemeral port
    async fn serve(script: impl FnOnce(&MockNetwork)) -> (Harness, ShellServer, String) {
        let h = harness(Config {
            asset_manifest: vec!["/".to_string(), "/app.js".to_string()],
            offline_shell: "/".to_string(),
            ..Config::default()
        });
        script(&h.network);

        let worker = ServiceWorker::spawn(h.ctx.clone(), Lifecycle::new(h.ctx.bucket()));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let backend = BackendClient::new(h.network.clone(), h.ctx.config.backend_url.clone());
        let mut server = ShellServer::new(ShellState {
            config: h.ctx.config.clone(),
            db: h.ctx.db.clone(),
            worker,
            notifications: h.notifications.clone(),
            dashboard: Some(Arc::new(DashboardController::polling(
                backend,
                Duration::from_secs(3600),
            ))),
        });
        let addr = server
            .start(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        (h, server, format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_cached_asset_served_from_cache() {
        let (h, _server, base) = serve(|network| {
            network.respond(&url("/"), Response::new(200, "shell"));
            network.respond(&url("/app.js"), Response::new(200, "bundle"));
        })
        .await;
        let calls_after_install = h.network.call_count();

        let response = client().get(format!("{}/app.js", base)).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["x-served-by"], "cache");
        assert_eq!(response.text().await.unwrap(), "bundle");
        assert_eq!(h.network.call_count(), calls_after_install);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_shell() {
        let (h, _server, base) = serve(|network| {
            network.respond(&url("/"), Response::new(200, "shell"));
        })
        .await;
        h.network.fail(&url("/portfolio"));

        let response = client()
            .get(format!("{}/portfolio", base))
            .header("accept", "text/html")
            .send()
            .await
            .unwrap();
        assert_eq!(response.headers()["x-served-by"], "offline-shell");
        assert_eq!(response.text().await.unwrap(), "shell");
    }

    #[tokio::test]
    async fn test_failed_api_request_is_bad_gateway() {
        let (h, _server, base) = serve(|_| {}).await;
        h.network.fail(&url("/api/portfolio"));

        let response = client().get(format!("{}/api/portfolio", base)).send().await.unwrap();
        assert_eq!(response.status(), 502);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "NETWORK_ERROR");
    }

    #[tokio::test]
    async fn test_push_endpoint_shows_notification() {
        let (h, _server, base) = serve(|_| {}).await;

        let response = client()
            .post(format!("{}/_worker/push", base))
            .body("AMC squeeze score 92")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["body"], "AMC squeeze score 92");
        assert_eq!(h.notifications.displayed().len(), 1);
    }

    #[tokio::test]
    async fn test_state_reports_active_worker() {
        let (_h, mut server, base) = serve(|_| {}).await;

        let body: Value = client().get(format!("{}/_worker/state", base)).send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["state"], "active");
        assert_eq!(body["version"], "squeeze-tracker-v1");

        server.stop();
        assert!(!server.is_running());
    }

    fn current_tab(server: &ShellServer) -> Option<Tab> {
        server.state.dashboard.as_ref().map(|d| d.snapshot().tab)
    }

    #[tokio::test]
    async fn test_explore_click_opens_buy_tab() {
        let (_h, server, base) = serve(|_| {}).await;

        let body: Value = client()
            .post(format!("{}/_worker/notificationclick", base))
            .json(&json!({"action": "explore"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["outcome"], "opened");
        assert_eq!(current_tab(&server), Some(Tab::Buy));
    }

    #[tokio::test]
    async fn test_navigation_deep_link_selects_tab() {
        let (h, server, base) = serve(|network| {
            network.respond(&url("/"), Response::new(200, "shell"));
        })
        .await;
        h.network.respond(&url("/?tab=sell"), Response::new(200, "shell"));

        client()
            .get(format!("{}/?tab=sell", base))
            .header("accept", "text/html")
            .send()
            .await
            .unwrap();
        assert_eq!(current_tab(&server), Some(Tab::Sell));
    }
}
