//! Fetch interceptor: cache-first, network fallback, offline shell for
//! navigations

use super::WorkerContext;
use crate::error::Result;
use crate::net::{Method, Request, Response};
use serde::Serialize;

/// Where an intercepted response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Network,
    /// Network failed on a navigation; cached shell served instead
    OfflineShell,
    /// Not intercepted (non-GET, cross-origin, or no active worker)
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub response: Response,
    pub source: FetchSource,
}

/// Forward a request untouched
pub(crate) async fn passthrough(ctx: &WorkerContext, request: &Request) -> Result<FetchResult> {
    let response = ctx.network.fetch(request).await?;
    Ok(FetchResult {
        response,
        source: FetchSource::Passthrough,
    })
}

/// Serve a request for a page the worker controls.
///
/// Only same-origin GETs are intercepted. Nothing is written to the cache
/// here: the bucket holds exactly what install stored.
pub async fn handle_fetch(ctx: &WorkerContext, request: &Request) -> Result<FetchResult> {
    if request.method != Method::Get || !request.is_same_origin(&ctx.config.origin) {
        return passthrough(ctx, request).await;
    }

    let bucket = ctx.bucket();
    match ctx.db.match_entry(bucket, request.url.as_str()) {
        Ok(Some(response)) => {
            tracing::debug!("Cache hit: {}", request.url);
            return Ok(FetchResult {
                response,
                source: FetchSource::Cache,
            });
        }
        Ok(None) => {}
        // A broken lookup is treated as a miss
        Err(e) => tracing::warn!("Cache lookup failed for {}: {}", request.url, e),
    }

    match ctx.network.fetch(request).await {
        Ok(response) => Ok(FetchResult {
            response,
            source: FetchSource::Network,
        }),
        Err(e) if request.is_navigation() => {
            let shell_url = ctx.config.resolve(&ctx.config.offline_shell)?;
            match ctx.db.match_entry(bucket, shell_url.as_str())? {
                Some(shell) => {
                    tracing::info!("Offline: serving shell for {}", request.url);
                    Ok(FetchResult {
                        response: shell,
                        source: FetchSource::OfflineShell,
                    })
                }
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}
