//! Configuration management for kuba-metrics
//!
//! TOML configuration with environment variable overrides and defaults for
//! every field, so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [engine]
//! dimension_match = "exact"      # or "subset"
//! empty_buckets = "omit"         # or "zerofill"
//! max_datums_per_put = 1000
//! max_buckets_per_query = 1440
//!
//! [storage]
//! data_dir = "/var/lib/kuba-metrics"
//! snapshot_on_shutdown = true
//!
//! [monitoring]
//! metrics_enabled = true
//! log_level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregation::{EmptyBucketPolicy, DEFAULT_MAX_BUCKETS};
use crate::error::{Error, Result};
use crate::storage::DimensionMatch;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "KUBA_METRICS_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kuba-metrics.toml";

/// Default maximum datums accepted by one put request
pub const DEFAULT_MAX_DATUMS_PER_PUT: usize = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Engine behavior and limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins (empty = allow all)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// How query dimensions select stored series
    #[serde(default)]
    pub dimension_match: DimensionMatch,

    /// Whether empty buckets are omitted or zero-filled
    #[serde(default)]
    pub empty_buckets: EmptyBucketPolicy,

    /// Maximum datums per put request
    #[serde(default = "default_max_datums_per_put")]
    pub max_datums_per_put: usize,

    /// Maximum period buckets per query
    #[serde(default = "default_max_buckets_per_query")]
    pub max_buckets_per_query: u64,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the snapshot; persistence is off when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Write a snapshot on graceful shutdown
    #[serde(default = "default_true")]
    pub snapshot_on_shutdown: bool,
}

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Serve Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_datums_per_put() -> usize {
    DEFAULT_MAX_DATUMS_PER_PUT
}
fn default_max_buckets_per_query() -> u64 {
    DEFAULT_MAX_BUCKETS
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension_match: DimensionMatch::default(),
            empty_buckets: EmptyBucketPolicy::default(),
            max_datums_per_put: default_max_datums_per_put(),
            max_buckets_per_query: default_max_buckets_per_query(),
        }
    }
}

impl EngineConfig {
    /// Validate engine limits
    pub fn validate(&self) -> Result<()> {
        if self.max_datums_per_put == 0 {
            return Err(Error::Configuration(
                "engine.max_datums_per_put must be > 0".to_string(),
            ));
        }
        if self.max_buckets_per_query == 0 {
            return Err(Error::Configuration(
                "engine.max_buckets_per_query must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            snapshot_on_shutdown: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml(&contents).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Resolve and load the configuration
    ///
    /// Priority:
    /// 1. `explicit` path (the `--config` flag)
    /// 2. `KUBA_METRICS_CONFIG` environment variable
    /// 3. `./kuba-metrics.toml`
    /// 4. Default configuration
    ///
    /// Environment overrides are applied in every case.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut config = match path {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok((config, path))
    }

    /// Apply `KUBA_METRICS_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("KUBA_METRICS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("KUBA_METRICS_PORT") {
            self.server.port = parse_var("KUBA_METRICS_PORT", &port)?;
        }

        // Engine
        if let Some(mode) = lookup("KUBA_METRICS_DIMENSION_MATCH") {
            self.engine.dimension_match = match mode.to_ascii_lowercase().as_str() {
                "exact" => DimensionMatch::Exact,
                "subset" => DimensionMatch::Subset,
                other => {
                    return Err(Error::Configuration(format!(
                        "KUBA_METRICS_DIMENSION_MATCH must be exact or subset, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(policy) = lookup("KUBA_METRICS_EMPTY_BUCKETS") {
            self.engine.empty_buckets = match policy.to_ascii_lowercase().as_str() {
                "omit" => EmptyBucketPolicy::Omit,
                "zerofill" => EmptyBucketPolicy::ZeroFill,
                other => {
                    return Err(Error::Configuration(format!(
                        "KUBA_METRICS_EMPTY_BUCKETS must be omit or zerofill, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(max) = lookup("KUBA_METRICS_MAX_DATUMS_PER_PUT") {
            self.engine.max_datums_per_put = parse_var("KUBA_METRICS_MAX_DATUMS_PER_PUT", &max)?;
        }
        if let Some(max) = lookup("KUBA_METRICS_MAX_BUCKETS_PER_QUERY") {
            self.engine.max_buckets_per_query =
                parse_var("KUBA_METRICS_MAX_BUCKETS_PER_QUERY", &max)?;
        }

        // Storage
        if let Some(data_dir) = lookup("KUBA_METRICS_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }

        // Monitoring
        if let Some(log_level) = lookup("KUBA_METRICS_LOG_LEVEL") {
            self.monitoring.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(Error::Configuration("server.host cannot be empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(Error::Configuration("server.port cannot be 0".to_string()));
        }

        self.engine.validate()?;

        if let Some(ref dir) = self.storage.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Configuration(
                    "storage.data_dir cannot be empty".to_string(),
                ));
            }
        }

        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.monitoring.log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::Configuration(format!(
                "monitoring.log_level must be one of {:?}, got '{}'",
                LEVELS, self.monitoring.log_level
            )));
        }

        Ok(())
    }

    /// The `host:port` listen address, with IPv6 hosts in brackets
    pub fn listen_addr(&self) -> String {
        let host = &self.server.host;
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.server.port)
        } else {
            format!("{}:{}", host, self.server.port)
        }
    }

    /// Render configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("Invalid value '{}' for {}", raw, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.max_datums_per_put, 1000);
        assert_eq!(config.engine.max_buckets_per_query, 1440);
        assert_eq!(config.engine.dimension_match, DimensionMatch::Exact);
        assert_eq!(config.engine.empty_buckets, EmptyBucketPolicy::Omit);
        assert!(config.storage.data_dir.is_none());
        assert!(config.monitoring.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_listen_addr_parses() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9000;
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");

        let addr: std::net::SocketAddr = "[::1]:8080".parse().unwrap();
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
        assert_eq!(config.listen_addr(), "[::1]:8080");
        assert_eq!(config.listen_addr().parse::<std::net::SocketAddr>().unwrap(), addr);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [engine]
            dimension_match = "subset"
            empty_buckets = "zerofill"

            [storage]
            data_dir = "/tmp/metrics"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.engine.dimension_match, DimensionMatch::Subset);
        assert_eq!(config.engine.empty_buckets, EmptyBucketPolicy::ZeroFill);
        assert_eq!(config.engine.max_datums_per_put, 1000);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/metrics")));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml("[engine]\ndimension_match = \"fuzzy\""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.max_buckets_per_query = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitoring.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("KUBA_METRICS_PORT", "9999"),
                ("KUBA_METRICS_DIMENSION_MATCH", "Subset"),
                ("KUBA_METRICS_MAX_DATUMS_PER_PUT", "20"),
                ("KUBA_METRICS_DATA_DIR", "/srv/metrics"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.engine.dimension_match, DimensionMatch::Subset);
        assert_eq!(config.engine.max_datums_per_put, 20);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/srv/metrics")));
    }

    #[test]
    fn test_bad_override() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(overrides(&[("KUBA_METRICS_PORT", "eighty")]))
            .is_err());
        assert!(config
            .apply_overrides(overrides(&[("KUBA_METRICS_EMPTY_BUCKETS", "sometimes")]))
            .is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kuba-metrics.toml");

        let mut config = Config::default();
        config.server.port = 7070;
        config.engine.empty_buckets = EmptyBucketPolicy::ZeroFill;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[server]\nport = 6060\n").unwrap();

        let (config, used) = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 6060);
        assert_eq!(used, Some(path));
    }
}
