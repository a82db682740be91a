//! Probe primitives
//!
//! `Prober` is the seam between the aggregator and the network. `NetProber`
//! is the real implementation: a bounded TCP connect and a bounded HTTP GET.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::ProbeSettings;
use crate::error::ProbeError;

#[async_trait]
pub trait Prober: Send + Sync {
    /// Succeeds when a TCP connection to `host:port` can be opened
    async fn check_port(&self, host: &str, port: u16) -> Result<(), ProbeError>;

    /// Succeeds only when `GET http://host:port{path}` answers 200
    async fn check_http(&self, host: &str, port: u16, path: &str) -> Result<u16, ProbeError>;
}

/// Probes over real sockets
pub struct NetProber {
    connect_timeout: Duration,
    http_timeout: Duration,
    client: reqwest::Client,
}

impl NetProber {
    pub fn new(connect_timeout: Duration, http_timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(http_timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(Self {
            connect_timeout,
            http_timeout,
            client,
        })
    }

    pub fn from_settings(settings: &ProbeSettings) -> Result<Self, ProbeError> {
        Self::new(settings.connect_timeout(), settings.http_timeout())
    }
}

#[async_trait]
impl Prober for NetProber {
    async fn check_port(&self, host: &str, port: u16) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            // Dropping the stream closes it without sending anything
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(ProbeError::ConnectionRefused)
            }
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    async fn check_http(&self, host: &str, port: u16, path: &str) -> Result<u16, ProbeError> {
        let url = format!("http://{}:{}{}", host, port, path);

        match tokio::time::timeout(self.http_timeout, self.client.get(&url).send()).await {
            Ok(Ok(resp)) if resp.status() == reqwest::StatusCode::OK => Ok(200),
            Ok(Ok(resp)) => Err(ProbeError::HttpStatus(resp.status().as_u16())),
            Ok(Err(e)) if e.is_timeout() => Err(ProbeError::Timeout),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}
