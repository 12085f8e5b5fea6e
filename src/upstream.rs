//! Upstream HTTP client
//!
//! Fetches mapped files from their origin with a fixed User-Agent and hands
//! the body back as a stream, so bytes reach the client as they arrive.
//! Connections to each origin are pooled and reused.

use crate::config::ServerConfig;
use crate::error::{BoxError, ProxyError};
use crate::proxy::ProxyBody;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error type for upstream fetches
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, DNS or protocol failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// No response head within the configured timeout
    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),
    /// Upstream answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(u16),
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Transport(_) | UpstreamError::Timeout(_) => {
                ProxyError::UpstreamUnreachable
            }
            UpstreamError::Status(status) => ProxyError::UpstreamStatus(status),
        }
    }
}

/// Statistics for upstream fetches
#[derive(Debug, Default)]
pub struct FetchStats {
    /// Total number of upstream requests started
    pub total_requests: AtomicU64,
    /// Requests that ended in a transport error or timeout
    pub unreachable: AtomicU64,
    /// Requests answered with a non-success status
    pub bad_status: AtomicU64,
}

impl FetchStats {
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unreachable(&self) {
        self.unreachable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bad_status(&self) {
        self.bad_status.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn get_unreachable(&self) -> u64 {
        self.unreachable.load(Ordering::Relaxed)
    }

    pub fn get_bad_status(&self) -> u64 {
        self.bad_status.load(Ordering::Relaxed)
    }
}

/// Configuration for the upstream client
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Maximum wait for the response head
    pub response_timeout: Duration,
    /// Maximum idle connections per host
    pub max_idle_per_host: usize,
    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for UpstreamConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            user_agent: server.user_agent.clone(),
            connect_timeout: server.upstream_connect_timeout(),
            response_timeout: server.upstream_timeout(),
            max_idle_per_host: server.pool_max_idle_per_host,
            idle_timeout: server.pool_idle_timeout(),
        }
    }
}

/// Pooled client for fetching upstream files
pub struct UpstreamClient {
    client: reqwest::Client,
    stats: Arc<FetchStats>,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        // No compression features are enabled, so no Accept-Encoding is sent
        // and bodies arrive exactly as the origin stores them.
        // Origins are contacted directly; HTTP_PROXY and friends are ignored.
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .no_proxy()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build upstream HTTP client: {}", e))?;

        debug!(
            user_agent = %config.user_agent,
            connect_timeout_secs = config.connect_timeout.as_secs(),
            response_timeout_secs = config.response_timeout.as_secs(),
            max_idle = config.max_idle_per_host,
            "Upstream client initialized"
        );

        Ok(Self {
            client,
            stats: Arc::new(FetchStats::default()),
            config,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// GET the url. On a 2xx answer the body is returned as a stream;
    /// anything else is an error and the upstream body is dropped.
    pub async fn fetch(&self, url: &str) -> Result<ProxyBody, UpstreamError> {
        self.stats.record_request();

        let timeout = self.config.response_timeout;
        let response = match tokio::time::timeout(timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.stats.record_unreachable();
                return Err(UpstreamError::Transport(e));
            }
            Err(_) => {
                self.stats.record_unreachable();
                return Err(UpstreamError::Timeout(timeout));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.stats.record_bad_status();
            return Err(UpstreamError::Status(status.as_u16()));
        }

        debug!(url, status = status.as_u16(), "Upstream responded, streaming body");
        Ok(stream_body(response))
    }
}

/// Forward the upstream body chunk by chunk
fn stream_body(response: reqwest::Response) -> ProxyBody {
    let frames = response
        .bytes_stream()
        .map(|chunk| chunk.map(Frame::data).map_err(BoxError::from));
    StreamBody::new(frames).boxed_unsync()
}
