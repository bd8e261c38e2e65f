//! Network layer
//!
//! Request/response value types shared by the worker and the backend
//! client, and the `Network` seam every outbound fetch goes through.

mod backend;
mod http;

pub use backend::{BackendClient, PortfolioStock};
pub use http::HttpNetwork;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(AppError::Validation(format!("Unsupported method: {}", other))),
        }
    }
}

/// How the request was issued by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestMode {
    /// Top-level document navigation
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

/// Outbound request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Plain sub-resource GET
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: RequestMode::NoCors,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Top-level document GET
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a JSON body and the matching content type
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the request targets the given origin
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}

/// Captured response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Anything that can perform a fetch.
///
/// `Err` is reserved for transport failures; HTTP error statuses come back
/// as `Ok` responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory network used across the crate's tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Clone)]
    enum Scripted {
        Respond(Response),
        Slow(Duration, Response),
        Fail,
    }

    #[derive(Default)]
    pub struct MockNetwork {
        routes: Mutex<HashMap<String, Scripted>>,
        calls: Mutex<Vec<(Method, String)>>,
    }

    impl MockNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, response: Response) {
            self.routes
                .lock()
                .insert(url.to_string(), Scripted::Respond(response));
        }

        pub fn respond_json(&self, url: &str, value: serde_json::Value) {
            let body = serde_json::to_vec(&value).unwrap();
            self.respond(
                url,
                Response::new(200, body).with_header("Content-Type", "application/json"),
            );
        }

        /// Answer only after `delay`, like a backend under load
        pub fn respond_after(&self, url: &str, delay: Duration, response: Response) {
            self.routes
                .lock()
                .insert(url.to_string(), Scripted::Slow(delay, response));
        }

        pub fn fail(&self, url: &str) {
            self.routes.lock().insert(url.to_string(), Scripted::Fail);
        }

        pub fn calls(&self) -> Vec<(Method, String)> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Network for MockNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            self.calls
                .lock()
                .push((request.method, request.url.to_string()));
            let scripted = self.routes.lock().get(request.url.as_str()).cloned();
            match scripted {
                Some(Scripted::Respond(response)) => Ok(response),
                Some(Scripted::Slow(delay, response)) => {
                    tokio::time::sleep(delay).await;
                    Ok(response)
                }
                Some(Scripted::Fail) => Err(AppError::Network(format!(
                    "connection refused: {}",
                    request.url
                ))),
                None => Ok(Response::new(404, "not found")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn test_same_origin() {
        let origin = Url::parse("http://localhost:8000").unwrap();
        let local = Request::get(Url::parse("http://localhost:8000/app.js").unwrap());
        let remote = Request::get(Url::parse("https://cdn.example.com/app.js").unwrap());
        assert!(local.is_same_origin(&origin));
        assert!(!remote.is_same_origin(&origin));
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new(201, r#"{"ok":true}"#).with_header("content-type", "application/json");
        assert!(response.is_ok());
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
        assert!(!Response::new(503, "").is_ok());
    }
}
