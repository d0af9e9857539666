//! HTTP client for the external analysis service.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::AnalysisUnavailable;
use crate::queue::ParsedEmail;

/// Produces the raw analysis text for an email.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, email: &ParsedEmail) -> Result<String, AnalysisUnavailable>;
}

/// Posts emails as JSON to the analysis endpoint.
///
/// Every call is bounded by the configured timeout; expiry is reported as
/// [`AnalysisUnavailable::Timeout`] and the request is cancelled.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid analysis endpoint: {}", endpoint))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.analysis_endpoint,
            Duration::from_millis(config.analysis_timeout_ms),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn unavailable(&self, e: reqwest::Error) -> AnalysisUnavailable {
        if e.is_timeout() {
            AnalysisUnavailable::Timeout(self.timeout)
        } else {
            AnalysisUnavailable::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(&self, email: &ParsedEmail) -> Result<String, AnalysisUnavailable> {
        let body = serde_json::to_vec(email)?;

        debug!(
            endpoint = %self.endpoint,
            subject = %email.subject,
            body_length = body.len(),
            "analysis_request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisUnavailable::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.unavailable(e))
    }
}
