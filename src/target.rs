//! Outbound calls to target services.

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRequest {
    /// HTTP method (as configured)
    pub method: String,
    /// Absolute URL including the mapped query string
    pub url: String,
    /// Headers in send order
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body, if any
    pub body: Option<Vec<u8>>,
}

/// What the target answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Sends requests to targets.
#[async_trait]
pub trait TargetClient: Send + Sync {
    async fn send(&self, request: TargetRequest) -> Result<TargetResponse, TargetError>;
}

/// [`TargetClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTargetClient {
    http: reqwest::Client,
}

impl HttpTargetClient {
    /// Create a client whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TargetError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TargetError::Client(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TargetClient for HttpTargetClient {
    async fn send(&self, request: TargetRequest) -> Result<TargetResponse, TargetError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| TargetError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TargetError::Timeout(request.url.clone())
            } else {
                TargetError::Request {
                    url: request.url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TargetError::Request {
                url: request.url.clone(),
                message: e.to_string(),
            })?
            .to_vec();

        trace!(url = %request.url, status, body_size = body.len(), "Target responded");

        Ok(TargetResponse {
            status,
            headers,
            body,
        })
    }
}

/// Target call errors. Surfaced to the caller as `502`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid target method: {0}")]
    InvalidMethod(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {0} timed out")]
    Timeout(String),
}
