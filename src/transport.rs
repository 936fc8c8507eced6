use async_trait::async_trait;
use rquest::{header, Client};
use std::time::Duration;
use thiserror::Error;

/// A single probe request failed at the transport level. Non-fatal:
/// the scanner folds it into that task's finding.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Io(String),
}

/// Status and full body of one response. Timing is taken by the caller
/// around the whole fetch, so body-read latency is included.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The engine's only interaction with the outside world: send one GET
/// with a deadline, return status and body. Implementations must be
/// safe to share across workers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError>;
}

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Live transport backed by a shared connection pool.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError> {
        let map_err = |e: rquest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Io(e.to_string())
            }
        };

        let resp = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_err)?;

        Ok(RawResponse { status, body })
    }
}
