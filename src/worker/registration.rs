//! Worker registration: one active worker per cache version

use super::events::{ServiceWorker, WorkerHandle};
use super::lifecycle::Lifecycle;
use super::WorkerContext;
use crate::error::Result;
use std::sync::Arc;

/// Tracks the active worker and swaps it when the version changes
#[derive(Default)]
pub struct Registration {
    active: Option<WorkerHandle>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&WorkerHandle> {
        self.active.as_ref()
    }

    /// Bring up the worker for `ctx`'s cache version.
    ///
    /// A version that already completed activation in an earlier run
    /// resumes directly; a new version installs, skips waiting, supersedes
    /// the previous worker and activates.
    pub async fn register(&mut self, ctx: Arc<WorkerContext>) -> Result<WorkerHandle> {
        let version = ctx.bucket().to_string();

        if let Some(current) = &self.active {
            if current.version() == version {
                return Ok(current.clone());
            }
        }

        let already_active = ctx.db.active_version()?.as_deref() == Some(version.as_str())
            && ctx.db.has_bucket(&version)?;

        let handle = if already_active {
            tracing::info!("Resuming worker {}", version);
            let handle = ServiceWorker::spawn(ctx, Lifecycle::resumed(version));
            self.retire_previous().await;
            handle
        } else {
            let handle = ServiceWorker::spawn(ctx, Lifecycle::new(version));
            let report = handle.install().await?;
            if !report.is_complete() {
                tracing::warn!(
                    "Worker {} installed with {} missing asset(s)",
                    report.version,
                    report.failed.len()
                );
            }
            // Skip waiting: the new version replaces the old one right away
            self.retire_previous().await;
            let activated = handle.activate().await?;
            tracing::info!(
                "Worker {} active, removed {} stale bucket(s)",
                activated.version,
                activated.deleted.len()
            );
            handle
        };

        self.active = Some(handle.clone());
        Ok(handle)
    }

    async fn retire_previous(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Err(e) = previous.supersede().await {
                tracing::warn!("Failed to supersede worker {}: {}", previous.version(), e);
            }
        }
    }
}
