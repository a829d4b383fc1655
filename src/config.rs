//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), resolved once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::BreakerConfigError;
use crate::resilience::BreakerConfig;

/// Error raised when a configuration value is present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR '{value}': {reason}")]
    ListenAddr {
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// A keyspace or table name is not a plain CQL identifier.
    #[error("{key} must be a CQL identifier ([A-Za-z0-9_], not starting with a digit), got '{value}'")]
    Identifier {
        /// Environment key.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// No contact points were given.
    #[error("CASSANDRA_NODES must list at least one contact point")]
    NoNodes,

    /// Breaker settings are inconsistent.
    #[error("invalid breaker configuration: {0}")]
    Breaker(#[from] BreakerConfigError),
}

/// Cluster connection settings.
#[derive(Debug, Clone)]
pub struct CassandraConfig {
    /// Contact points as `host:port`.
    pub nodes: Vec<String>,
    /// Keyspace the session is bound to.
    pub keyspace: String,
    /// Table holding employee rows.
    pub table: String,
    /// Optional username for password authentication.
    pub username: Option<String>,
    /// Optional password for password authentication.
    pub password: Option<String>,
    /// Timeout in seconds for establishing a connection.
    pub connect_timeout_secs: u64,
}

impl Default for CassandraConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:9042".to_string()],
            keyspace: "code2succeed".to_string(),
            table: "emps".to_string(),
            username: None,
            password: None,
            connect_timeout_secs: 5,
        }
    }
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`ServiceConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Cluster connection settings.
    pub cassandra: CassandraConfig,

    /// Guarded writer settings for the `upsert_cassandra` command.
    pub breaker: BreakerConfig,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl ServiceConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or not parseable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `LISTEN_ADDR` cannot be parsed, a
    /// keyspace or table name is not a valid identifier, no contact point is
    /// given, or the breaker settings are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let listen_addr = raw_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::ListenAddr {
                value: raw_addr.clone(),
                reason: e.to_string(),
            })?;

        let defaults = CassandraConfig::default();
        let cassandra = CassandraConfig {
            nodes: std::env::var("CASSANDRA_NODES")
                .map(|v| parse_nodes(&v))
                .unwrap_or(defaults.nodes),
            keyspace: std::env::var("CASSANDRA_KEYSPACE").unwrap_or(defaults.keyspace),
            table: std::env::var("CASSANDRA_TABLE").unwrap_or(defaults.table),
            username: std::env::var("CASSANDRA_USERNAME").ok(),
            password: std::env::var("CASSANDRA_PASSWORD").ok(),
            connect_timeout_secs: parse_env(
                "CASSANDRA_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
        };

        let base = BreakerConfig::default();
        let breaker = BreakerConfig {
            name: base.name,
            timeout: parse_env_millis("BREAKER_TIMEOUT_MS", base.timeout),
            max_concurrent: parse_env("BREAKER_MAX_CONCURRENT", base.max_concurrent),
            volume_threshold: parse_env("BREAKER_VOLUME_THRESHOLD", base.volume_threshold),
            sleep_window: parse_env_millis("BREAKER_SLEEP_WINDOW_MS", base.sleep_window),
            error_percent_threshold: parse_env(
                "BREAKER_ERROR_PERCENT",
                base.error_percent_threshold,
            ),
            rolling_window: parse_env_millis("BREAKER_ROLLING_WINDOW_MS", base.rolling_window),
            rolling_buckets: parse_env("BREAKER_ROLLING_BUCKETS", base.rolling_buckets),
        };

        let log_json = matches!(
            std::env::var("LOG_FORMAT").ok().as_deref(),
            Some("json") | Some("JSON")
        );

        let config = Self {
            listen_addr,
            cassandra,
            breaker,
            log_json,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cassandra.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        check_identifier("CASSANDRA_KEYSPACE", &self.cassandra.keyspace)?;
        check_identifier("CASSANDRA_TABLE", &self.cassandra.table)?;
        Ok(self.breaker.validate()?)
    }
}

/// Splits a comma separated node list, dropping blanks.
fn parse_nodes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_identifier(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ConfigError::Identifier {
            key,
            value: value.to_string(),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding milliseconds.
fn parse_env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_millis)
}
