//! Transport abstraction for remote service calls.
//!
//! The [`Transport`] trait decouples the retrying client from the actual HTTP
//! stack (currently `reqwest`). Tests use scripted transports that return
//! predetermined responses without touching the network.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde_json::Value;
use tracing::{debug, instrument};

/// HTTP verbs the remote service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
}

/// One remote action: method, absolute URL and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::Post, url, body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::Put, url, body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::Patch, url, body)
    }

    fn with_body(method: Method, url: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// The parts of a response the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Server-requested wait (`Retry-After`, whole seconds).
    pub retry_after: Option<u64>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; an empty body reads as `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).with_context(|| format!("parse {} response body", self.status))
    }

    /// First `limit` characters of the body, for diagnostics.
    pub fn body_excerpt(&self, limit: usize) -> String {
        self.body.chars().take(limit).collect()
    }
}

/// Abstraction over HTTP backends. `Err` means the request never produced a
/// response (connect, timeout, TLS, body read).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
}

/// Builds one transport per profile, bound to that profile's token.
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    fn connect(&self, token: &str) -> Result<Self::Transport>;
}

/// `reqwest`-backed transport carrying a bearer token in its default headers.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(token: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("token is not a valid header value")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(method = ?request.method, url = %request.url))]
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
        };
        let mut builder = self.http.request(method, &request.url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.context("send request")?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.context("read response body")?;
        debug!(status, retry_after = ?retry_after, body_len = body.len(), "response received");
        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Connector producing [`HttpTransport`]s with shared settings.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, token: &str) -> Result<HttpTransport> {
        HttpTransport::new(token, &self.user_agent, self.timeout)
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored.
pub fn parse_retry_after(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_accepts_only_digits() {
        assert_eq!(parse_retry_after("3"), Some(3));
        assert_eq!(parse_retry_after(" 12 "), Some(12));
        assert_eq!(parse_retry_after("1.5"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn success_covers_2xx_only() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(304, "").is_success());
        assert!(!ApiResponse::new(401, "").is_success());
    }

    #[test]
    fn empty_body_parses_as_null() {
        assert!(ApiResponse::new(200, "  ").json().expect("json").is_null());
        assert!(ApiResponse::new(200, "{not json").json().is_err());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let response = ApiResponse::new(400, "héllo wörld");
        assert_eq!(response.body_excerpt(4), "héll");
    }

    #[test]
    fn http_transport_rejects_tokens_with_newlines() {
        let err = HttpTransport::new("abc\ndef", "ua", Duration::from_secs(1))
            .err()
            .expect("invalid header");
        assert!(err.to_string().contains("not a valid header value"));
    }
}
