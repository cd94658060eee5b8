//! HTTP client with the transport policy composed around every dispatch
//!
//! Used both by the test runner (pointed at the gateway) and by the gateway
//! itself (pointed at the upstream API).

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    redirect, Body, Client, Method, Request, StatusCode,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::policy::{PolicyError, TransportPolicy};

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// HTTP client routed through a [`TransportPolicy`]
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Option<Url>,
    policy: TransportPolicy,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create client with custom timeout
    pub fn with_timeout(policy: TransportPolicy, timeout_secs: u64) -> Result<Self> {
        Self::build(policy, timeout_secs, redirect::Policy::default())
    }

    /// Client for the forwarding leg: redirects are handed back to the caller untouched
    pub fn for_gateway(policy: TransportPolicy, timeout_secs: u64) -> Result<Self> {
        Self::build(policy, timeout_secs, redirect::Policy::none())
    }

    fn build(policy: TransportPolicy, timeout_secs: u64, redirect: redirect::Policy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(redirect)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: None,
            policy,
            timeout_secs,
        })
    }

    /// Set base URL for relative request paths
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Build full URL
    pub fn build_url(&self, path: &str) -> Result<Url, HttpError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| HttpError::InvalidUrl(format!("{path}: {e}")));
        }

        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| HttpError::InvalidUrl(format!("{path}: no base URL configured")))?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| HttpError::InvalidUrl(format!("{joined}: {e}")))
    }

    /// Dispatch a fully built request through the policy and read the whole response
    pub async fn execute(&self, mut request: Request) -> Result<HttpResponse, HttpError> {
        self.policy.prepare(&mut request)?;

        let url = request.url().to_string();
        debug!("Sending {} request to {}", request.method(), url);
        let start = Instant::now();

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                HttpError::ConnectionRefused(url.clone())
            } else if e.is_builder() {
                HttpError::InvalidUrl(url.clone())
            } else {
                HttpError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::Body(e.to_string()))?;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            start.elapsed().as_millis()
        );

        let response = HttpResponse {
            status,
            headers,
            body,
        };
        self.policy.inspect(&response)?;
        Ok(response)
    }

    /// Send a request relative to the base URL
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = self.build_url(&request.path)?;

        let mut outbound = Request::new(request.method, url);
        outbound.headers_mut().extend(request.headers);
        if let Some(body) = request.body {
            *outbound.body_mut() = Some(Body::from(body));
        }

        self.execute(outbound).await
    }
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `payload` as the body with a JSON content type
    pub fn json<T: Serialize + ?Sized>(self, payload: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body))
    }
}

/// Fully buffered HTTP response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
