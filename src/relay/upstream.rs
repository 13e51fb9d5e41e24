//! Upstream backend access.
//!
//! Handlers never touch a real HTTP client directly: they go through the
//! [`UpstreamBackend`] trait, so the relay is testable against a mock
//! backend. [`HttpUpstream`] is the production implementation over
//! reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::api::ChatRequest;
use crate::utils::url::construct_api_url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub type UpstreamStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream connection refused")]
    Refused,

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream returned HTTP {code}")]
    Status { code: u16 },

    #[error("upstream request failed: {0}")]
    Other(String),
}

impl UpstreamError {
    /// Human-readable diagnosis carried in wire-shaped error payloads.
    ///
    /// Connection refusal gets its own phrasing so operators can tell a
    /// dead backend from every other failure class at a glance.
    pub fn diagnosis(&self) -> String {
        match self {
            UpstreamError::Refused => "Backend connection failed (Connection Refused)".to_string(),
            UpstreamError::Timeout => "Error: upstream request timed out".to_string(),
            UpstreamError::Status { code } => format!("Error: upstream returned HTTP {code}"),
            UpstreamError::Other(message) => format!("Error: {message}"),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if is_connection_refused(&e) {
            UpstreamError::Refused
        } else if e.is_timeout() {
            UpstreamError::Timeout
        } else if let Some(status) = e.status() {
            UpstreamError::Status {
                code: status.as_u16(),
            }
        } else {
            UpstreamError::Other(e.to_string())
        }
    }
}

fn is_connection_refused(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Abstraction over the backend the relay fronts.
#[async_trait]
pub trait UpstreamBackend: Send + Sync {
    /// Open the upstream NDJSON stream (streaming mode).
    async fn stream(&self, request: &ChatRequest) -> Result<UpstreamStream, UpstreamError>;

    /// Fetch the complete buffered reply, verbatim (single-shot mode).
    async fn fetch(&self, request: &ChatRequest) -> Result<Bytes, UpstreamError>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
    chat_url: String,
    request_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            chat_url: construct_api_url(base_url, "api/chat"),
            request_timeout,
        })
    }
}

#[async_trait]
impl UpstreamBackend for HttpUpstream {
    async fn stream(&self, request: &ChatRequest) -> Result<UpstreamStream, UpstreamError> {
        // No total timeout here: a healthy stream may legitimately run for
        // minutes. The connect timeout still bounds an unreachable host.
        let response = self
            .client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response
            .bytes_stream()
            .map(|item| item.map_err(UpstreamError::from))
            .boxed())
    }

    async fn fetch(&self, request: &ChatRequest) -> Result<Bytes, UpstreamError> {
        let response = self
            .client
            .post(&self.chat_url)
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_distinguishes_connection_refused() {
        assert_eq!(
            UpstreamError::Refused.diagnosis(),
            "Backend connection failed (Connection Refused)"
        );
        assert!(UpstreamError::Other("boom".to_string())
            .diagnosis()
            .starts_with("Error: "));
        assert!(UpstreamError::Status { code: 502 }
            .diagnosis()
            .contains("502"));
    }

    #[test]
    fn upstream_url_is_built_from_the_base() {
        let upstream = HttpUpstream::new("http://127.0.0.1:8000/").expect("client builds");
        assert_eq!(upstream.chat_url, "http://127.0.0.1:8000/api/chat");
    }
}
