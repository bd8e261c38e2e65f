//! Backend REST client
//!
//! Thin pass-through over the analysis backend. Payloads stay schema-less
//! (`serde_json::Value`); the dashboard renders them, it does not validate
//! them. No retries: a failed call surfaces as a generic `AppError::Api`.

use super::{Method, Network, Request};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Body of a portfolio add call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioStock {
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
}

/// Client for the squeeze-tracker backend
#[derive(Clone)]
pub struct BackendClient {
    network: Arc<dyn Network>,
    base_url: Url,
}

impl BackendClient {
    pub fn new(network: Arc<dyn Network>, base_url: Url) -> Self {
        Self { network, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ========== Health ==========

    pub async fn health(&self) -> Result<Value> {
        self.get("health check", "/api/health").await
    }

    // ========== Stocks ==========

    /// Search stocks by symbol or name
    pub async fn search_stocks(&self, query: &str) -> Result<Vec<Value>> {
        let path = format!("/api/stock/search?q={}", urlencoding::encode(query.trim()));
        let body = self.get("stock search", &path).await?;
        Ok(unwrap_list(body, "results"))
    }

    // ========== Portfolio ==========

    pub async fn portfolio(&self) -> Result<Vec<Value>> {
        let body = self.get("portfolio", "/api/portfolio").await?;
        Ok(unwrap_list(body, "portfolio"))
    }

    pub async fn add_to_portfolio(&self, stock: &PortfolioStock) -> Result<Value> {
        if stock.symbol.trim().is_empty() {
            return Err(AppError::Validation("Symbol is required".to_string()));
        }
        let stock = PortfolioStock {
            symbol: stock.symbol.trim().to_uppercase(),
            ..stock.clone()
        };
        let request = Request::get(self.url("/api/portfolio/add")?)
            .with_method(Method::Post)
            .with_json(&stock)?;
        self.send("add to portfolio", request).await
    }

    /// Remove a position; the backend also drops its exit signals
    pub async fn remove_from_portfolio(&self, symbol: &str) -> Result<Value> {
        let path = format!("/api/portfolio/{}", symbol_segment(symbol));
        self.call("remove from portfolio", Method::Delete, &path).await
    }

    // ========== Signals ==========

    pub async fn squeeze_opportunities(&self) -> Result<Vec<Value>> {
        let body = self.get("squeeze scan", "/api/squeeze-opportunities").await?;
        Ok(unwrap_list(body, "opportunities"))
    }

    pub async fn exit_signals(&self) -> Result<Vec<Value>> {
        let body = self.get("exit signals", "/api/exit-signals").await?;
        Ok(unwrap_list(body, "exit_signals"))
    }

    // ========== Manual triggers ==========

    /// Ask the backend to run a squeeze scan now
    pub async fn scan_squeezes(&self) -> Result<Value> {
        self.call("manual squeeze scan", Method::Post, "/api/manual/scan-squeezes")
            .await
    }

    /// Ask the backend to run the portfolio monitor now
    pub async fn monitor_portfolio(&self) -> Result<Value> {
        self.call(
            "manual portfolio monitor",
            Method::Post,
            "/api/manual/monitor-portfolio",
        )
        .await
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Validation(format!("Invalid path '{}': {}", path, e)))
    }

    async fn get(&self, operation: &str, path: &str) -> Result<Value> {
        self.call(operation, Method::Get, path).await
    }

    async fn call(&self, operation: &str, method: Method, path: &str) -> Result<Value> {
        let request = Request::get(self.url(path)?)
            .with_method(method)
            .with_header("Content-Type", "application/json");
        self.send(operation, request).await
    }

    async fn send(&self, operation: &str, request: Request) -> Result<Value> {
        let response = self.network.fetch(&request).await.map_err(|e| {
            tracing::warn!("{} {} failed: {}", request.method, request.url, e);
            AppError::Api(format!("{} failed", operation))
        })?;

        if !response.is_ok() {
            tracing::warn!(
                "{} {} returned {}: {}",
                request.method,
                request.url,
                response.status,
                response.text()
            );
            return Err(AppError::Api(format!("{} failed", operation)));
        }

        response.json().map_err(|e| {
            tracing::warn!("{} returned invalid JSON: {}", request.url, e);
            AppError::Api(format!("{} failed", operation))
        })
    }
}

fn symbol_segment(symbol: &str) -> String {
    urlencoding::encode(&symbol.trim().to_uppercase()).into_owned()
}

/// Pull the list out of a `{key: [...]}` envelope; a bare array is accepted too
fn unwrap_list(body: Value, key: &str) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
