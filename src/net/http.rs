//! reqwest-backed network

use super::{Method, Network, Request, Response};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Network implementation over a shared reqwest client
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        // Connection-level failures are what the interceptor falls back on
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?
            .to_vec();

        tracing::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
