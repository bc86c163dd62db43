//! Exporter configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags; later sources win.
//!
//! ```toml
//! bind_addr = ":9141"
//! metrics_path = "/metrics"
//! zookeeper = "zk-1.internal:2181"
//! reset_on_scrape = false
//! log_level = "debug"
//! refresh_interval = 15
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

/// Errors that stop the exporter before it starts serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("enable_tls requires both cert and cert_key")]
    MissingTlsMaterial,

    #[error("invalid metrics path {0:?}: must start with '/', not be the root, and contain no route parameters")]
    InvalidMetricsPath(String),

    #[error("invalid bind address {0:?}")]
    InvalidBindAddr(String),

    #[error("zookeeper address must not be empty")]
    EmptyZookeeperAddr,

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("refresh interval must be at least one second")]
    InvalidRefreshInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Listen address; a bare `:port` listens on every interface.
    pub bind_addr: String,
    pub metrics_path: String,
    /// `host:port` of the ZooKeeper client socket.
    pub zookeeper: String,
    /// Send `srst` after every successful scrape.
    pub reset_on_scrape: bool,
    /// Serve the HTTP endpoints over TLS.
    pub enable_tls: bool,
    /// PEM certificate chain, intermediaries included.
    pub cert: Option<PathBuf>,
    pub cert_key: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
    /// Seconds between background scrapes. Unset means scrape per request.
    pub refresh_interval: Option<u64>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            bind_addr: ":9141".to_string(),
            metrics_path: "/metrics".to_string(),
            zookeeper: "localhost:2181".to_string(),
            reset_on_scrape: true,
            enable_tls: false,
            cert: None,
            cert_key: None,
            log_level: "info".to_string(),
            log_json: false,
            refresh_interval: None,
        }
    }
}

impl ExporterConfig {
    /// Defaults, overlaid with `file` when given, overlaid with `overrides`.
    pub fn load(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_tls && (self.cert.is_none() || self.cert_key.is_none()) {
            return Err(ConfigError::MissingTlsMaterial);
        }
        if !is_valid_metrics_path(&self.metrics_path) {
            return Err(ConfigError::InvalidMetricsPath(self.metrics_path.clone()));
        }
        if self.zookeeper.trim().is_empty() {
            return Err(ConfigError::EmptyZookeeperAddr);
        }
        if self.refresh_interval == Some(0) {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        self.log_level_filter()?;
        self.socket_addr()?;
        Ok(())
    }

    /// Resolve `bind_addr` to a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = if self.bind_addr.starts_with(':') {
            format!("0.0.0.0{}", self.bind_addr)
        } else {
            self.bind_addr.clone()
        };
        addr.to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::InvalidBindAddr(self.bind_addr.clone()))
    }

    /// Parse `log_level`. Accepts `warning`, `fatal` and `panic` as aliases.
    pub fn log_level_filter(&self) -> Result<LevelFilter, ConfigError> {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => Ok(LevelFilter::TRACE),
            "debug" => Ok(LevelFilter::DEBUG),
            "info" => Ok(LevelFilter::INFO),
            "warn" | "warning" => Ok(LevelFilter::WARN),
            "error" | "fatal" | "panic" => Ok(LevelFilter::ERROR),
            "off" => Ok(LevelFilter::OFF),
            _ => Err(ConfigError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval.map(Duration::from_secs)
    }
}

/// A metrics path must be absolute, not the root, and free of router
/// syntax (`{param}`, `:param`, `*wildcard`).
fn is_valid_metrics_path(path: &str) -> bool {
    path.starts_with('/')
        && path != "/"
        && !path.contains(['{', '}'])
        && !path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
}

/// Command-line flags. Every flag is optional so that an unset flag
/// leaves the file or default value alone.
#[derive(Debug, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Bind address for the metrics server [default: :9141]
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Path to the metrics endpoint [default: /metrics]
    #[arg(long)]
    pub metrics_path: Option<String>,

    /// host:port for the zookeeper socket [default: localhost:2181]
    #[arg(long)]
    pub zookeeper: Option<String>,

    /// Send a reset command to zookeeper after each scrape [default: true]
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub reset_on_scrape: Option<bool>,

    /// Serve the metrics endpoint over TLS. Requires --cert and --cert-key
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub enable_tls: Option<bool>,

    /// Path to certificate including any intermediaries
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Path to certificate key
    #[arg(long)]
    pub cert_key: Option<PathBuf>,

    /// Log level [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output as JSON
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub log_json: Option<bool>,

    /// Scrape in the background every SECS seconds and serve the last result
    #[arg(long, value_name = "SECS")]
    pub refresh_interval: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut ExporterConfig) {
        if let Some(v) = self.bind_addr {
            config.bind_addr = v;
        }
        if let Some(v) = self.metrics_path {
            config.metrics_path = v;
        }
        if let Some(v) = self.zookeeper {
            config.zookeeper = v;
        }
        if let Some(v) = self.reset_on_scrape {
            config.reset_on_scrape = v;
        }
        if let Some(v) = self.enable_tls {
            config.enable_tls = v;
        }
        if let Some(v) = self.cert {
            config.cert = Some(v);
        }
        if let Some(v) = self.cert_key {
            config.cert_key = Some(v);
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        if let Some(v) = self.log_json {
            config.log_json = v;
        }
        if let Some(v) = self.refresh_interval {
            config.refresh_interval = Some(v);
        }
    }
}
