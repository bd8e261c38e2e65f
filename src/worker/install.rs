//! Install handler: populate the current bucket from the asset manifest

use super::WorkerContext;
use crate::error::{AppError, Result};
use crate::net::{Request, Response};
use futures_util::future::join_all;
use serde::Serialize;
use url::Url;

/// Outcome of populating the cache
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub version: String,
    /// Manifest paths now in the bucket
    pub cached: Vec<String>,
    /// Manifest paths that could not be fetched, with the reason
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch every manifest asset and store the ones that succeed.
///
/// Assets are fetched concurrently and independently: one bad URL does
/// not keep the others out of the cache.
pub async fn install(ctx: &WorkerContext) -> Result<InstallReport> {
    let bucket = ctx.bucket();
    ctx.db.open_bucket(bucket)?;

    let fetches = ctx.config.asset_manifest.iter().map(|path| async move {
        let result = fetch_asset(ctx, path).await;
        (path.clone(), result)
    });

    let mut report = InstallReport {
        version: bucket.to_string(),
        ..Default::default()
    };

    for (path, result) in join_all(fetches).await {
        let stored = result.and_then(|(url, response)| {
            ctx.db.put_entry(bucket, url.as_str(), &response)
        });
        match stored {
            Ok(()) => report.cached.push(path),
            Err(e) => {
                tracing::warn!("Failed to cache {}: {}", path, e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    tracing::info!(
        "Install {}: cached {} of {} assets",
        bucket,
        report.cached.len(),
        ctx.config.asset_manifest.len()
    );
    Ok(report)
}

async fn fetch_asset(ctx: &WorkerContext, path: &str) -> Result<(Url, Response)> {
    let url = ctx.config.resolve(path)?;
    let response = ctx.network.fetch(&Request::get(url.clone())).await?;
    if !response.is_ok() {
        return Err(AppError::Cache(format!(
            "{} returned status {}",
            url, response.status
        )));
    }
    Ok((url, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::worker::testing::{harness, url};

    fn config_with(assets: &[&str]) -> Config {
        Config {
            asset_manifest: assets.iter().map(|s| s.to_string()).collect(),
            offline_shell: "/".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_failed_asset_does_not_block_install() {
        let h = harness(config_with(&["/", "/app.js"]));
        h.network.respond(&url("/"), Response::new(200, "<html>shell</html>"));
        h.network.fail(&url("/app.js"));

        let report = install(&h.ctx).await.unwrap();

        assert_eq!(report.cached, vec!["/".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "/app.js");
        assert_eq!(h.ctx.db.bucket_keys(h.ctx.bucket()).unwrap(), vec![url("/")]);
    }

    #[tokio::test]
    async fn test_each_single_failure_is_isolated() {
        let assets = ["/", "/index.html", "/styles.css", "/app.js", "/manifest.json"];
        for broken in assets {
            let h = harness(Config::default());
            for path in assets {
                if path == broken {
                    h.network.fail(&url(path));
                } else {
                    h.network.respond(&url(path), Response::new(200, path));
                }
            }

            let report = install(&h.ctx).await.unwrap();
            assert_eq!(report.cached.len(), assets.len() - 1, "broken asset {}", broken);
            let keys = h.ctx.db.bucket_keys(h.ctx.bucket()).unwrap();
            assert!(!keys.contains(&url(broken)));
        }
    }

    #[tokio::test]
    async fn test_error_status_is_not_cached() {
        let h = harness(config_with(&["/", "/missing.js"]));
        h.network.respond(&url("/"), Response::new(200, "shell"));
        // Unscripted URLs answer 404

        let report = install(&h.ctx).await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(h.ctx.db.bucket_keys(h.ctx.bucket()).unwrap(), vec![url("/")]);
    }
}
