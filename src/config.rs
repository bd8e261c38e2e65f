//! Runtime configuration
//!
//! Defaults match the deployed dashboard; every field can be overridden
//! through a `SQUEEZE_*` environment variable.

use crate::error::{AppError, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Static assets needed to render the offline shell
pub const DEFAULT_ASSET_MANIFEST: &[&str] =
    &["/", "/index.html", "/styles.css", "/app.js", "/manifest.json"];

pub const DEFAULT_CACHE_VERSION: &str = "squeeze-tracker-v1";
pub const DEFAULT_SYNC_TAG: &str = "background-sync";

/// Shell configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Name of the current cache bucket
    pub cache_version: String,

    /// Origin the dashboard is served from
    pub origin: Url,

    /// Base URL of the analysis backend
    pub backend_url: Url,

    /// Root-relative paths cached at install time
    pub asset_manifest: Vec<String>,

    /// Document served to navigations when the network is down
    pub offline_shell: String,

    /// Sync tag that triggers the signal refresh
    pub sync_tag: String,

    /// Backend path fetched by background sync
    pub sync_endpoint: String,

    /// Directory holding the SQLite database
    pub data_dir: PathBuf,

    /// Address of the local HTTP front
    pub listen_addr: SocketAddr,

    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let origin = Url::parse("http://localhost:8000").expect("static origin is valid");
        Self {
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            backend_url: origin.clone(),
            origin,
            asset_manifest: DEFAULT_ASSET_MANIFEST.iter().map(|s| s.to_string()).collect(),
            offline_shell: "/index.html".to_string(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            sync_endpoint: "/api/squeeze-opportunities".to_string(),
            data_dir: PathBuf::from("./data"),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            poll_interval_secs: 30,
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SQUEEZE_CACHE_VERSION") {
            config.cache_version = v;
        }
        if let Some(v) = lookup("SQUEEZE_ORIGIN") {
            config.origin = parse_url("SQUEEZE_ORIGIN", &v)?;
            // Backend follows the origin unless set explicitly
            config.backend_url = config.origin.clone();
        }
        if let Some(v) = lookup("SQUEEZE_BACKEND_URL") {
            config.backend_url = parse_url("SQUEEZE_BACKEND_URL", &v)?;
        }
        if let Some(v) = lookup("SQUEEZE_ASSETS") {
            config.asset_manifest = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("SQUEEZE_OFFLINE_SHELL") {
            config.offline_shell = v;
        }
        if let Some(v) = lookup("SQUEEZE_SYNC_TAG") {
            config.sync_tag = v;
        }
        if let Some(v) = lookup("SQUEEZE_SYNC_ENDPOINT") {
            config.sync_endpoint = v;
        }
        if let Some(v) = lookup("SQUEEZE_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SQUEEZE_LISTEN_ADDR") {
            config.listen_addr = v.parse().map_err(|e| {
                AppError::Config(format!("Invalid SQUEEZE_LISTEN_ADDR '{}': {}", v, e))
            })?;
        }
        if let Some(v) = lookup("SQUEEZE_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = parse_secs("SQUEEZE_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("SQUEEZE_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_secs("SQUEEZE_HTTP_TIMEOUT_SECS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_version.trim().is_empty() {
            return Err(AppError::Config("Cache version must not be empty".to_string()));
        }
        if self.asset_manifest.is_empty() {
            return Err(AppError::Config("Asset manifest must not be empty".to_string()));
        }
        if let Some(bad) = self.asset_manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(AppError::Config(format!(
                "Manifest path '{}' must be root-relative",
                bad
            )));
        }
        if !self.asset_manifest.contains(&self.offline_shell) {
            return Err(AppError::Config(format!(
                "Offline shell '{}' is not in the asset manifest",
                self.offline_shell
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("Poll interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolve a root-relative path against the app origin
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| AppError::Config(format!("Cannot resolve '{}': {}", path, e)))
    }

    /// Resolve a backend path against the backend base URL
    pub fn backend(&self, path: &str) -> Result<Url> {
        self.backend_url
            .join(path)
            .map_err(|e| AppError::Config(format!("Cannot resolve '{}': {}", path, e)))
    }

    /// Location of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("squeeze-shell.db")
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.asset_manifest.len(), 5);
        assert_eq!(config.sync_tag, "background-sync");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SQUEEZE_CACHE_VERSION", "squeeze-tracker-v2"),
            ("SQUEEZE_ORIGIN", "https://squeeze.example.com"),
            ("SQUEEZE_ASSETS", "/, /index.html ,/app.js"),
            ("SQUEEZE_POLL_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.cache_version, "squeeze-tracker-v2");
        assert_eq!(config.backend_url.as_str(), "https://squeeze.example.com/");
        assert_eq!(config.asset_manifest, vec!["/", "/index.html", "/app.js"]);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let result = Config::from_lookup(lookup(&[("SQUEEZE_HTTP_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_shell_must_be_cached() {
        let mut config = Config::default();
        config.offline_shell = "/offline.html".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serializes_urls_as_strings() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(value["origin"], "http://localhost:8000/");
        assert_eq!(value["backend_url"], "http://localhost:8000/");
    }

    #[test]
    fn test_resolve_paths() {
        let config = Config::default();
        assert_eq!(
            config.resolve("/?tab=buy").unwrap().as_str(),
            "http://localhost:8000/?tab=buy"
        );
        assert_eq!(
            config.backend("/api/health").unwrap().as_str(),
            "http://localhost:8000/api/health"
        );
    }
}
