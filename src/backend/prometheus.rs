//! Prometheus HTTP API backend
//!
//! Evaluates instant queries via `GET /api/v1/query`. Every request carries
//! the configured bearer credential.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use super::client::{BackendClient, QueryResult, Sample};
use super::error::QueryError;
use crate::config::{BackendConfig, ConfigError};

/// Envelope of every Prometheus API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorSample>),
    Scalar((f64, String)),
    Matrix(serde_json::Value),
    String(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Prometheus instant query client
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    /// HTTP client (reused across requests, carries the auth header)
    client: reqwest::Client,

    /// Full URL of the instant query endpoint
    query_url: String,
}

impl PrometheusClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ConfigError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            query_url: format!("{}/api/v1/query", config.url.trim_end_matches('/')),
        })
    }

    async fn execute(
        &self,
        query: &str,
        at: DateTime<Utc>,
        budget: Duration,
    ) -> Result<QueryResult, QueryError> {
        let time = format_unix_seconds(at);
        let timeout = format!("{:.3}", budget.as_secs_f64());

        let response = self
            .client
            .get(&self.query_url)
            .query(&[
                ("query", query),
                ("time", time.as_str()),
                ("timeout", timeout.as_str()),
            ])
            .send()
            .await
            .map_err(QueryError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(QueryError::Transport)?;

        if !status.is_success() {
            // Prometheus reports errors in the JSON envelope; fall back to the raw body
            let message = serde_json::from_str::<ApiResponse>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or(body);
            return Err(QueryError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse =
            serde_json::from_str(&body).map_err(|e| QueryError::Malformed(e.to_string()))?;

        if envelope.status != "success" {
            return Err(QueryError::Backend {
                kind: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: envelope.error.unwrap_or_default(),
            });
        }

        if !envelope.warnings.is_empty() {
            debug!("query `{query}` returned warnings: {:?}", envelope.warnings);
        }

        match envelope.data {
            Some(QueryData::Vector(samples)) => {
                let samples = samples
                    .into_iter()
                    .map(|sample| {
                        Ok(Sample {
                            labels: sample.metric,
                            timestamp: sample.value.0,
                            value: parse_value(&sample.value.1)?,
                        })
                    })
                    .collect::<Result<Vec<_>, QueryError>>()?;
                Ok(QueryResult::from_vector(samples))
            }
            Some(QueryData::Scalar((_, value))) => Ok(QueryResult::Scalar(parse_value(&value)?)),
            Some(QueryData::Matrix(_)) => Err(QueryError::UnexpectedResult("matrix".to_string())),
            Some(QueryData::String(_)) => Err(QueryError::UnexpectedResult("string".to_string())),
            None => Err(QueryError::Malformed("missing `data` field".to_string())),
        }
    }
}

#[async_trait]
impl BackendClient for PrometheusClient {
    #[instrument(skip(self, at, deadline))]
    async fn query(
        &self,
        query: &str,
        at: DateTime<Utc>,
        deadline: Instant,
    ) -> Result<QueryResult, QueryError> {
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return Err(QueryError::Timeout(budget));
        }

        trace!("evaluating with {budget:?} left");

        match tokio::time::timeout_at(deadline, self.execute(query, at, budget)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(budget)),
        }
    }
}

/// Unix timestamp with millisecond precision, as accepted by the `time` parameter
fn format_unix_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

/// Prometheus encodes sample values as strings, including special floats
fn parse_value(raw: &str) -> Result<f64, QueryError> {
    match raw {
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other
            .parse()
            .map_err(|_| QueryError::Malformed(format!("invalid sample value `{other}`"))),
    }
}
