//! HTTP front handlers
//!
//! Every request that is not a worker control endpoint is turned into a
//! worker fetch event, so the browser sees exactly what the interceptor
//! decides: cache, network, or the offline shell.

use crate::config::Config;
use crate::dashboard::{DashboardController, PanelKind};
use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, ErrorResponse};
use crate::net::{Method, PortfolioStock, Request, RequestMode};
use crate::notify::NotificationCenter;
use crate::worker::{ClickOutcome, FetchSource, WorkerHandle};
use axum::{
    body::{Body, Bytes},
    extract::{Json, Path, Query, State as AxumState},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Headers that describe one hop and must not be forwarded
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// Shared state for the HTTP front
pub struct ShellState {
    pub config: Arc<Config>,
    pub db: Arc<SqliteDb>,
    pub worker: WorkerHandle,
    pub notifications: Arc<NotificationCenter>,
    pub dashboard: Option<Arc<DashboardController>>,
}

fn error_response(status: StatusCode, err: &AppError) -> Response {
    (status, Json(ErrorResponse::from(err))).into_response()
}

// ============================================================================
// Worker control
// ============================================================================

/// POST /_worker/push - body is the plain-text push payload
pub async fn push(AxumState(state): AxumState<Arc<ShellState>>, body: Bytes) -> Response {
    let payload = (!body.is_empty()).then(|| body.to_vec());
    match state.worker.push(payload).await {
        Ok(notification) => (StatusCode::CREATED, Json(notification)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// POST /_worker/sync/:tag
pub async fn sync(
    AxumState(state): AxumState<Arc<ShellState>>,
    Path(tag): Path<String>,
) -> Response {
    match state.worker.sync(tag.clone()).await {
        Ok(stored) => Json(json!({"tag": tag, "stored": stored})).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClickPayload {
    pub notification_id: Option<String>,
    #[serde(default)]
    pub action: String,
}

/// POST /_worker/notificationclick
pub async fn notification_click(
    AxumState(state): AxumState<Arc<ShellState>>,
    Json(payload): Json<ClickPayload>,
) -> Response {
    match state
        .worker
        .notification_click(payload.notification_id, payload.action)
        .await
    {
        Ok(outcome) => {
            if let (ClickOutcome::Opened(window), Some(dashboard)) = (&outcome, &state.dashboard) {
                dashboard.select_tab(&window.url);
            }
            Json(outcome).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// GET /_worker/state
pub async fn worker_state(AxumState(state): AxumState<Arc<ShellState>>) -> Response {
    let lifecycle = match state.worker.state().await {
        Ok(lifecycle) => lifecycle,
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    };
    let buckets = match state.db.list_buckets() {
        Ok(buckets) => buckets,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    };
    let offline_records = state.db.record_count().unwrap_or_default();

    Json(json!({
        "version": state.worker.version(),
        "state": lifecycle,
        "buckets": buckets,
        "offline_records": offline_records,
        "notifications": state.notifications.displayed(),
    }))
    .into_response()
}

// ============================================================================
// Dashboard
// ============================================================================

fn controller(state: &ShellState) -> std::result::Result<&Arc<DashboardController>, Response> {
    state.dashboard.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            &AppError::NotFound("Dashboard polling is disabled".to_string()),
        )
    })
}

/// GET /_worker/dashboard
pub async fn dashboard(AxumState(state): AxumState<Arc<ShellState>>) -> Response {
    match controller(&state) {
        Ok(controller) => Json(controller.snapshot()).into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /_worker/dashboard/search?q=
pub async fn dashboard_search(
    AxumState(state): AxumState<Arc<ShellState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match controller(&state) {
        Ok(controller) => Json(controller.search(&query.q).await).into_response(),
        Err(response) => response,
    }
}

/// POST /_worker/dashboard/refresh/:panel
pub async fn dashboard_refresh(
    AxumState(state): AxumState<Arc<ShellState>>,
    Path(panel): Path<PanelKind>,
) -> Response {
    match controller(&state) {
        Ok(controller) => {
            controller.refresh(panel).await;
            Json(controller.snapshot()).into_response()
        }
        Err(response) => response,
    }
}

/// POST /_worker/dashboard/portfolio
pub async fn dashboard_add(
    AxumState(state): AxumState<Arc<ShellState>>,
    Json(stock): Json<PortfolioStock>,
) -> Response {
    let controller = match controller(&state) {
        Ok(controller) => controller,
        Err(response) => return response,
    };
    match controller.add_to_portfolio(stock).await {
        Ok(()) => (StatusCode::CREATED, Json(controller.snapshot())).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e),
    }
}

/// POST /_worker/dashboard/scan
pub async fn dashboard_scan(AxumState(state): AxumState<Arc<ShellState>>) -> Response {
    let controller = match controller(&state) {
        Ok(controller) => controller,
        Err(response) => return response,
    };
    match controller.scan_squeezes().await {
        Ok(()) => (StatusCode::ACCEPTED, Json(controller.snapshot())).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e),
    }
}

/// POST /_worker/dashboard/monitor
pub async fn dashboard_monitor(AxumState(state): AxumState<Arc<ShellState>>) -> Response {
    let controller = match controller(&state) {
        Ok(controller) => controller,
        Err(response) => return response,
    };
    match controller.monitor_portfolio().await {
        Ok(()) => (StatusCode::ACCEPTED, Json(controller.snapshot())).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e),
    }
}

/// DELETE /_worker/dashboard/portfolio/:symbol
pub async fn dashboard_remove(
    AxumState(state): AxumState<Arc<ShellState>>,
    Path(symbol): Path<String>,
) -> Response {
    let controller = match controller(&state) {
        Ok(controller) => controller,
        Err(response) => return response,
    };
    match controller.remove_from_portfolio(&symbol).await {
        Ok(()) => Json(controller.snapshot()).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e),
    }
}

// ============================================================================
// Fetch interception
// ============================================================================

/// Fallback: route the request through the worker
pub async fn intercept(
    AxumState(state): AxumState<Arc<ShellState>>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match to_worker_request(&state.config, &method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    if request.is_navigation() {
        if let Some(dashboard) = &state.dashboard {
            dashboard.select_tab(&request.url);
        }
    }

    match state.worker.fetch(request).await {
        Ok(result) => {
            let mut response = axum::http::Response::builder().status(result.response.status);
            for (name, value) in &result.response.headers {
                if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                    continue;
                }
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    response = response.header(name, value);
                }
            }
            response = response.header("x-served-by", source_label(result.source));
            response
                .body(Body::from(result.response.body))
                .unwrap_or_else(|e| {
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &AppError::Internal(e.to_string()),
                    )
                })
        }
        Err(e) => {
            warn!("{} {} rejected: {}", method, uri, e);
            error_response(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

fn source_label(source: FetchSource) -> &'static str {
    match source {
        FetchSource::Cache => "cache",
        FetchSource::Network => "network",
        FetchSource::OfflineShell => "offline-shell",
        FetchSource::Passthrough => "passthrough",
    }
}

/// Translate an inbound request into the worker's request type
pub(crate) fn to_worker_request(
    config: &Config,
    method: &axum::http::Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> crate::error::Result<Request> {
    // The target only ever replaces path and query; host stays the origin's
    let mut url = config.origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    let method: Method = method.as_str().parse()?;

    let mode = if is_navigation(headers) {
        RequestMode::Navigate
    } else {
        RequestMode::SameOrigin
    };

    let mut request = Request::get(url).with_method(method).with_mode(mode);
    for (name, value) in headers {
        if HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    if !body.is_empty() {
        request = request.with_body(body.to_vec());
    }
    Ok(request)
}

fn is_navigation(headers: &HeaderMap) -> bool {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase()
    };

    header("sec-fetch-mode") == "navigate" || header("accept").contains("text/html")
}
