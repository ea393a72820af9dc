//! Remote fact provider.
//!
//! One `GET` per requested fact against a public endpoint returning
//! `{"text": "..."}`. The first failed attempt abandons the batch and the
//! fallback pool is returned instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::schema::FactSourceConfig;
use crate::error::FactError;
use crate::observability::metrics;

use super::{FactBatch, FactSource};

/// Maximum accepted response body size in bytes.
const MAX_RESPONSE_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct FactPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Fact source backed by a remote JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpFactProvider {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    max_chars: usize,
    fallback: Vec<String>,
}

impl HttpFactProvider {
    /// Builds a provider from configuration.
    ///
    /// Redirects are not followed; a redirecting endpoint counts as a
    /// failed attempt.
    ///
    /// # Errors
    ///
    /// Returns `FactError::Network` if the HTTP client cannot be built.
    pub fn new(config: &FactSourceConfig) -> Result<Self, FactError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FactError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_chars: config.max_chars,
            fallback: config.fallback.clone(),
        })
    }

    /// Fetches and validates a single fact.
    ///
    /// The timeout covers the whole call, headers and body together.
    async fn fetch_one(&self) -> Result<String, FactError> {
        tokio::time::timeout(self.timeout, self.request())
            .await
            .map_err(|_| FactError::Timeout)?
    }

    async fn request(&self) -> Result<String, FactError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FactError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FactError::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FactError::Network(e.to_string()))?;

        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(FactError::InvalidPayload(format!(
                "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
            )));
        }

        let payload: FactPayload =
            serde_json::from_slice(&bytes).map_err(|e| FactError::InvalidPayload(e.to_string()))?;

        let text = payload
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(FactError::MissingText)?;

        let len = text.chars().count();
        if len > self.max_chars {
            return Err(FactError::TooLong {
                len,
                limit: self.max_chars,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl FactSource for HttpFactProvider {
    async fn fetch_facts(&self, count: usize) -> FactBatch {
        let mut facts = Vec::with_capacity(count);
        for attempt in 0..count {
            match self.fetch_one().await {
                Ok(text) => facts.push(text),
                Err(error) => {
                    debug!(attempt, %error, endpoint = %self.endpoint, "fact fetch failed");
                    info!(count, "using fallback facts");
                    let batch = FactBatch::fallback(&self.fallback, count);
                    metrics::record_fact_batch(batch.origin());
                    return batch;
                }
            }
        }

        debug!(count, "fetched remote facts");
        let batch = FactBatch::remote(facts);
        metrics::record_fact_batch(batch.origin());
        batch
    }
}
