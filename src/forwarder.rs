//! Delivery of snapshots to the downstream analysis service
//!
//! The forwarder POSTs a JSON document and classifies the outcome. It never
//! retries; a failed delivery is reported to the caller and the next cycle
//! starts from scratch.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use crate::Snapshot;
use crate::config::{ConfigError, ResolvedForwardConfig};

/// Document sent downstream
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Payload<'a> {
    /// A single snapshot, serialized as one object
    Snapshot(&'a Snapshot),

    /// A window, serialized as an array of snapshot objects, oldest first
    Window(&'a [Snapshot]),
}

impl Payload<'_> {
    /// Number of snapshots carried by this payload
    pub fn len(&self) -> usize {
        match self {
            Payload::Snapshot(_) => 1,
            Payload::Window(snapshots) => snapshots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Downstream answered with a non-success status; `body` is kept verbatim
    #[error("downstream service error (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Connection refused, timeout, ...
    #[error("failed to reach downstream service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to serialize payload: {0}")]
    Serialization(#[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    url: String,
}

impl Forwarder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &ResolvedForwardConfig) -> Result<Self, ConfigError> {
        Self::new(config.url.clone(), config.timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver `payload` with a single POST.
    ///
    /// The response body is discarded on success.
    #[instrument(skip(self, payload), fields(url = %self.url, snapshots = payload.len()))]
    pub async fn forward(&self, payload: &Payload<'_>) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload).map_err(DeliveryError::Serialization)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(DeliveryError::Transport)?;
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("sent {} snapshot(s) to downstream service", payload.len());
        Ok(())
    }
}
