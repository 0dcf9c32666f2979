use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use tracing::trace;

use crate::template::{QueryTemplate, TemplateError};
use crate::{EntityId, MetricName};

/// Errors raised while loading or validating the configuration
///
/// All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid query for metric `{metric}`: {source}")]
    Template {
        metric: MetricName,
        #[source]
        source: TemplateError,
    },

    #[error("no {0} configured")]
    Missing(&'static str),

    #[error("entity `{0}` is configured more than once")]
    DuplicateEntity(EntityId),

    #[error("`{field}` must be at least 1, got {value}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("window capacity must be at least 1")]
    InvalidWindowCapacity,

    #[error("backend token is not a valid header value")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub backend: BackendConfig,

    /// metric name -> query template with one `%s` slot
    pub queries: BTreeMap<MetricName, String>,

    pub entities: Vec<EntityId>,

    /// Seconds between two collection cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Seconds every cycle may spend on backend queries
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Number of snapshots forwarded together (absent or 0: single snapshots)
    #[serde(default)]
    pub window_size: Option<usize>,

    #[serde(default)]
    pub forward: ForwardConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub token: Option<String>,

    /// Accept self-signed or otherwise unverifiable backend certificates
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_url")]
    pub url: String,

    /// Seconds to wait for the downstream service
    #[serde(default = "default_forward_timeout")]
    pub timeout: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            url: default_forward_url(),
            timeout: default_forward_timeout(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_query_timeout() -> u64 {
    10
}

fn default_max_concurrent_queries() -> usize {
    8
}

fn default_forward_url() -> String {
    "http://localhost:8082/analyze".to_string()
}

fn default_forward_timeout() -> u64 {
    30
}

/// How collected snapshots are handed to the forwarder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// Every snapshot is forwarded on its own
    Snapshot,

    /// Snapshots are buffered and forwarded as a window of this size
    Window(NonZeroUsize),
}

/// Validated configuration, ready to build the pipeline from
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub backend: BackendConfig,
    pub queries: Vec<(MetricName, QueryTemplate)>,
    pub entities: Vec<EntityId>,
    pub interval: Duration,
    pub query_timeout: Duration,
    pub max_concurrent_queries: NonZeroUsize,
    pub mode: ForwardMode,
    pub forward: ResolvedForwardConfig,
}

#[derive(Debug, Clone)]
pub struct ResolvedForwardConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Templates are parsed here so that resolving a query during a cycle can
    /// never fail for structural reasons.
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        if self.queries.is_empty() {
            return Err(ConfigError::Missing("queries"));
        }
        if self.entities.is_empty() {
            return Err(ConfigError::Missing("entities"));
        }
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.entities.iter().find(|entity| !seen.insert(*entity)) {
            return Err(ConfigError::DuplicateEntity(duplicate.clone()));
        }
        if self.backend.url.is_empty() {
            return Err(ConfigError::Missing("backend url"));
        }

        let queries = self
            .queries
            .into_iter()
            .map(|(metric, raw)| match QueryTemplate::parse(&raw) {
                Ok(template) => Ok((metric, template)),
                Err(source) => Err(ConfigError::Template { metric, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let interval = at_least_one("interval", self.interval)?;
        let query_timeout = at_least_one("query_timeout", self.query_timeout)?;
        let forward_timeout = at_least_one("forward.timeout", self.forward.timeout)?;

        let max_concurrent_queries = NonZeroUsize::new(self.max_concurrent_queries).ok_or(
            ConfigError::OutOfRange {
                field: "max_concurrent_queries",
                value: 0,
            },
        )?;

        let mode = match self.window_size.and_then(NonZeroUsize::new) {
            Some(size) => ForwardMode::Window(size),
            None => ForwardMode::Snapshot,
        };

        Ok(ResolvedConfig {
            backend: self.backend,
            queries,
            entities: self.entities,
            interval: Duration::from_secs(interval),
            query_timeout: Duration::from_secs(query_timeout),
            max_concurrent_queries,
            mode,
            forward: ResolvedForwardConfig {
                url: self.forward.url,
                timeout: Duration::from_secs(forward_timeout),
            },
        })
    }
}

fn at_least_one(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::OutOfRange { field, value })
    } else {
        Ok(value)
    }
}

/// Read a JSON configuration file, or TOML if the extension is `.toml`.
pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;

    let parsed: Result<Config, String> = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&file_content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&file_content).map_err(|e| e.to_string())
    };

    parsed
        .map_err(|message| ConfigError::Parse {
            path: display,
            message,
        })
        .inspect(|config| trace!("loaded config: {:?}", config.redacted()))
}

impl Config {
    /// Copy of the config with the bearer token masked, for logging.
    fn redacted(&self) -> Config {
        let mut config = self.clone();
        if config.backend.token.is_some() {
            config.backend.token = Some("***".to_string());
        }
        config
    }
}
