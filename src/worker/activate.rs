//! Activate handler: purge stale buckets, record the version, claim clients

use super::WorkerContext;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub version: String,
    /// Buckets removed because their name differs from the current version
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// Delete every bucket other than the current version.
///
/// Failures are logged and skipped; activation always proceeds.
pub(crate) fn purge_stale_buckets(ctx: &WorkerContext) -> ActivateReport {
    let current = ctx.bucket();
    let mut report = ActivateReport {
        version: current.to_string(),
        ..Default::default()
    };

    let names = match ctx.db.bucket_names() {
        Ok(names) => names,
        Err(e) => {
            tracing::error!("Failed to list cache buckets: {}", e);
            Vec::new()
        }
    };

    for name in names.into_iter().filter(|name| name != current) {
        match ctx.db.delete_bucket(&name) {
            Ok(_) => {
                tracing::info!("Deleted stale cache bucket {}", name);
                report.deleted.push(name);
            }
            Err(e) => tracing::error!("Failed to delete cache bucket {}: {}", name, e),
        }
    }

    if let Err(e) = ctx.db.set_active_version(current) {
        tracing::error!("Failed to record active version {}: {}", current, e);
    }

    report
}

/// Take control of all open windows
pub(crate) async fn claim_clients(ctx: &WorkerContext, report: &mut ActivateReport) {
    match ctx.clients.claim().await {
        Ok(claimed) => report.claimed = claimed,
        Err(e) => tracing::error!("Failed to claim clients: {}", e),
    }
}
