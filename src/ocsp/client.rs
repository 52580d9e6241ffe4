// src/ocsp/client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Sends one encoded OCSP request and returns the raw response body
#[async_trait]
pub trait OcspTransport: Send + Sync {
    async fn query(&self, server_url: &str, request: &[u8]) -> Result<Vec<u8>>;
}

/// OCSP over HTTP POST (RFC 6960 appendix A.1)
pub struct HttpOcspClient {
    http_client: reqwest::Client,
}

impl HttpOcspClient {
    /// Create a client; `None` leaves reqwest's default (no) timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl OcspTransport for HttpOcspClient {
    async fn query(&self, server_url: &str, request: &[u8]) -> Result<Vec<u8>> {
        debug!("POST {} ({} byte request)", server_url, request.len());

        let response = self
            .http_client
            .post(server_url)
            .header(reqwest::header::CONTENT_TYPE, "application/ocsp-request")
            .body(request.to_vec())
            .send()
            .await
            .context("error fetching OCSP")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("error fetching OCSP: responder returned {}", status);
        }

        let body = response.bytes().await.context("error reading OCSP")?;

        Ok(body.to_vec())
    }
}
