//! Time-series backends queried for metric samples
//!
//! This module provides a trait-based abstraction over the time-series
//! backend, so the collector can be driven by Prometheus in production and by
//! in-process fakes in tests.
//!
//! ## Design
//!
//! - **Trait-based**: `BackendClient` allows swapping implementations
//! - **Typed results**: `QueryResult` makes the shape of an answer explicit
//! - **Deadline-bound**: every query receives the cycle deadline
//!
//! ## Backends
//!
//! - **Prometheus**: HTTP API (`/api/v1/query`) with bearer authentication
//!
//! ## Usage
//!
//! ```no_run
//! use metrics_relay::backend::{BackendClient, prometheus::PrometheusClient};
//! use metrics_relay::config::BackendConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BackendConfig {
//!     url: "https://prometheus.internal:9090".to_string(),
//!     token: Some("secret".to_string()),
//!     insecure_skip_verify: false,
//! };
//! let client = PrometheusClient::new(&config)?;
//! let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
//! let result = client.query("up", chrono::Utc::now(), deadline).await?;
//! println!("{:?}", result.first_value());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod prometheus;

pub use client::{BackendClient, QueryResult, Sample};
pub use error::QueryError;
