//! How JSON-RPC calls reach the consensus engine.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::BroadcastError;

/// Default timeout for a broadcast request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts one JSON-RPC request body and returns the decoded response body.
pub trait RpcTransport: Send + Sync {
    fn post(&self, body: Value) -> impl Future<Output = Result<Value, BroadcastError>> + Send;
}

/// JSON-RPC over HTTP to the engine's RPC endpoint.
pub struct HttpTransport {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Wait for commit can take a whole block interval; size the timeout to it.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RpcTransport for HttpTransport {
    async fn post(&self, body: Value) -> Result<Value, BroadcastError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BroadcastError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    BroadcastError::Unreachable(format!("connection failed: {e}"))
                } else {
                    BroadcastError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(BroadcastError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            BroadcastError::InvalidResponse(format!("failed to parse RPC response: {e}"))
        })
    }
}
