//! Prometheus Pushgateway client
//!
//! Every push replaces the whole `job/<job>[/instance/<instance>]` group
//! with a single gauge, encoded in the text exposition format.

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};

/// Something that can publish the health gauge
#[async_trait]
pub trait GaugeSink: Send + Sync {
    /// Publish `value` under the gauge named `name`
    async fn push(&self, name: &str, value: f64) -> Result<(), PushError>;
}

/// Pushgateway sink
pub struct Pushgateway {
    client: reqwest::Client,
    base_url: url::Url,
    instance: Option<String>,
}

impl Pushgateway {
    /// Create a new pushgateway client
    pub fn new(
        base_url: url::Url,
        instance: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            instance,
        })
    }

    /// Grouping key URL for a job
    pub fn group_url(&self, job: &str) -> Result<url::Url, PushError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PushError::Url(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["metrics", "job", job]);
            if let Some(instance) = &self.instance {
                segments.extend(["instance", instance.as_str()]);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl GaugeSink for Pushgateway {
    async fn push(&self, name: &str, value: f64) -> Result<(), PushError> {
        let url = self.group_url(name)?;
        let body = encode_gauge(name, value)?;

        tracing::info!(metric = %name, value, url = %url, "Pushing gauge");

        let response = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await
            .map_err(|e| PushError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PushError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::info!(metric = %name, value, url = %url, "Gauge pushed");

        Ok(())
    }
}

/// Render a single gauge in the Prometheus text format
pub fn encode_gauge(name: &str, value: f64) -> Result<Vec<u8>, PushError> {
    let gauge = Gauge::with_opts(Opts::new(name, format!("{} health gauge", name)))
        .map_err(|e| PushError::Encode(e.to_string()))?;
    gauge.set(value);

    let registry = Registry::new();
    registry
        .register(Box::new(gauge))
        .map_err(|e| PushError::Encode(e.to_string()))?;

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| PushError::Encode(e.to_string()))?;

    Ok(buffer)
}

/// Push errors
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Cannot encode metric: {0}")]
    Encode(String),

    #[error("Push request failed: {0}")]
    Request(String),

    #[error("Pushgateway returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Pushgateway URL cannot take a path: {0}")]
    Url(String),
}
