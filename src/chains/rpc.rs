//! RPC transport
//!
//! JSON-RPC (EVM, Sui) and REST (Cosmos LCD, Aptos) clients shared by the adapters.
//! Reads go through [`RetryPolicy`]; submissions use the `*_once` calls and are never
//! repeated, since a repeated broadcast may double-spend.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Exponential backoff for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// JSON-RPC
// ============================================================================

/// JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

/// JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    client: Client,
    url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
            timeout,
            retry,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Idempotent read, retried per the policy.
    pub async fn read<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, TransportError> {
        self.retry
            .run(method, || self.call_once(method, &params))
            .await
    }

    /// Single attempt. A `null` result deserializes into `Option::None`.
    pub async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T, TransportError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let rpc_future = async {
            self.client
                .post(&self.url)
                .json(&request)
                .send()
                .await?
                .json::<JsonRpcResponse>()
                .await
                .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", method, e)))
        };

        let response = tokio::time::timeout(self.timeout, rpc_future)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_millis() as u64))??;

        if let Some(error) = response.error {
            debug!("JSON-RPC error from {} ({}): {}", self.url, method, error.message);
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| TransportError::InvalidResponse(format!("{} result: {}", method, e)))
    }
}

// ============================================================================
// REST
// ============================================================================

pub struct RestClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// GET `path`; `Ok(None)` on 404.
    pub async fn get_json(&self, path: &str) -> Result<Option<Value>, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        self.retry
            .run(path, || async {
                let response = self.client.get(&url).send().await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = check_status(response, &url).await?;
                response
                    .json::<Value>()
                    .await
                    .map(Some)
                    .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", url, e)))
            })
            .await
    }

    /// POST for read-only endpoints (e.g. Move view functions), retried like a GET.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        self.retry
            .run(path, || async {
                let response = self.client.post(&url).json(body).send().await?;
                let response = check_status(response, &url).await?;
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", url, e)))
            })
            .await
    }
}

fn http_client(timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {}", e)))
}

async fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(TransportError::Http(format!("{} returned {}: {}", url, status, body)))
    } else {
        Err(TransportError::InvalidResponse(format!("{} returned {}: {}", url, status, body)))
    }
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Result<u64, TransportError> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(clean, 16)
        .map_err(|_| TransportError::InvalidResponse(format!("invalid hex quantity '{}'", value)))
}
