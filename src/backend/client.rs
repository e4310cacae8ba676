//! Social IME HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{normalize_candidates, request_path, Backend};
use crate::config::Config;
use crate::error::{Result, SkkError};

/// Plain-HTTP client for the conversion API, optionally through a proxy.
#[derive(Debug, Clone)]
pub struct SocialImeClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SocialImeClient {
    /// Builds a client from the server configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_options(
            &config.backend_url,
            config.proxy.as_deref(),
            config.backend_timeout,
        )
    }

    /// Builds a client for `base_url`, routed through `proxy` when given.
    pub fn with_options(base_url: &str, proxy: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout);

        builder = match proxy {
            Some(url) => builder.proxy(reqwest::Proxy::http(url)?),
            None => builder.no_proxy(),
        };

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Full lookup URL for `query`.
    pub fn url_for(&self, query: &[u8]) -> String {
        format!("{}{}", self.base_url, request_path(query))
    }

    async fn request(&self, query: &[u8]) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url_for(query))
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(SkkError::EmptyResponse);
        }
        Ok(normalize_candidates(&body))
    }

    /// Runs one lookup under the overall timeout.
    pub async fn try_fetch(&self, query: &[u8]) -> Result<Vec<u8>> {
        tokio::time::timeout(self.timeout, self.request(query))
            .await
            .map_err(|_| SkkError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl Backend for SocialImeClient {
    async fn fetch(&self, query: &[u8]) -> Option<Vec<u8>> {
        match self.try_fetch(query).await {
            Ok(candidates) => {
                debug!(
                    query = %String::from_utf8_lossy(query),
                    bytes = candidates.len(),
                    "Backend lookup succeeded"
                );
                Some(candidates)
            }
            Err(e) => {
                warn!(query = %String::from_utf8_lossy(query), "Backend lookup failed: {}", e);
                None
            }
        }
    }
}
