use rand::Rng;
use reqwest::{Method, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Default probe timeout, applied to each HTTP attempt
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Raw outcome of a probe that received an HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub elapsed_ms: u64,
}

/// Why a probe produced no usable HTTP response.
///
/// The `Display` text is what the endpoint shows as its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_decode() || err.is_body() {
            ProbeError::InvalidResponse
        } else {
            ProbeError::Transport(format!("HTTP request failed: {}", err))
        }
    }
}

/// Probe client for endpoint checks
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Perform one probe, returning the status code and elapsed milliseconds
    async fn probe(&self, target: &Url) -> Result<ProbeResponse, ProbeError>;
}

/// HTTP/HTTPS prober.
///
/// Tries a `HEAD` first and falls back to a full `GET` when the server rejects
/// it or the attempt fails. Both attempts use the same timeout.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self { client })
    }

    async fn send(&self, method: Method, target: &Url) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();
        let full_fetch = method == Method::GET;

        let response = self.client.request(method, target.clone()).send().await?;
        let status_code = response.status().as_u16();

        if full_fetch {
            response.bytes().await?;
        }

        Ok(ProbeResponse { status_code, elapsed_ms: start.elapsed().as_millis() as u64 })
    }
}

/// Servers that refuse `HEAD` outright get a second chance with `GET`
fn rejects_head(status_code: u16) -> bool {
    status_code == StatusCode::METHOD_NOT_ALLOWED.as_u16()
        || status_code == StatusCode::NOT_IMPLEMENTED.as_u16()
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Url) -> Result<ProbeResponse, ProbeError> {
        match self.send(Method::HEAD, target).await {
            Ok(response) if !rejects_head(response.status_code) => Ok(response),
            Ok(response) => {
                debug!(%target, status = response.status_code, "HEAD rejected, retrying with GET");
                self.send(Method::GET, target).await
            }
            Err(e) => {
                debug!(%target, error = %e, "HEAD failed, retrying with GET");
                self.send(Method::GET, target).await
            }
        }
    }
}

/// Offline prober producing random latencies and outcomes
pub struct MockProber;

#[async_trait::async_trait]
impl Prober for MockProber {
    async fn probe(&self, _target: &Url) -> Result<ProbeResponse, ProbeError> {
        let (latency_ms, roll) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(350..=1200u64), rng.gen_range(1..=100u32))
        };

        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        match roll {
            1..=70 => Ok(ProbeResponse { status_code: 200, elapsed_ms: latency_ms }),
            71..=85 => Ok(ProbeResponse { status_code: 502, elapsed_ms: latency_ms }),
            _ => Err(ProbeError::InvalidResponse),
        }
    }
}
