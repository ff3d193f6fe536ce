//! Connection configuration.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3306;
const DEFAULT_CONNECTION_LIMIT: u32 = 10;
const DEFAULT_CHARSET: &str = "utf8mb4";
const DEFAULT_TIMEZONE: &str = "+00:00";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(60_000);
const DEFAULT_KEEP_ALIVE_DELAY: Duration = Duration::from_millis(10_000);
const DEFAULT_CONNECT_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Database connection and pool settings.
///
/// Fixed once a pool has been built from it. Every optional field has the
/// default a pool is created with when the field is omitted, and durations
/// deserialize from milliseconds.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Upper bound on pooled connections.
    #[serde(default = "default_connection_limit")]
    pub connection_limit: u32,
    /// Maximum number of callers waiting for a connection; 0 is unbounded.
    #[serde(default)]
    pub queue_limit: u32,
    /// When false, checkout fails immediately instead of waiting for a free connection.
    #[serde(default = "default_true")]
    pub wait_for_connections: bool,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub multiple_statements: bool,
    #[serde(default = "default_connect_timeout", deserialize_with = "millis")]
    pub connect_timeout: Duration,
    #[serde(default = "default_idle_timeout", deserialize_with = "millis")]
    pub idle_timeout: Duration,
    #[serde(default = "default_true")]
    pub enable_keep_alive: bool,
    #[serde(default = "default_keep_alive_delay", deserialize_with = "millis")]
    pub keep_alive_initial_delay: Duration,
    /// Connection attempts made by `connect()` before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Base backoff; attempt `n` waits `n * retry_delay` after failing.
    #[serde(default = "default_retry_delay", deserialize_with = "millis")]
    pub retry_delay: Duration,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            queue_limit: 0,
            wait_for_connections: true,
            charset: DEFAULT_CHARSET.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            multiple_statements: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            enable_keep_alive: true,
            keep_alive_initial_delay: DEFAULT_KEEP_ALIVE_DELAY,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build a config from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
    /// `DB_NAME` and `DB_CONNECTION_LIMIT`.
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        let mut config = Self::new(
            var("DB_HOST", "localhost"),
            var("DB_USER", "root"),
            var("DB_PASSWORD", ""),
            var("DB_NAME", "test"),
        );
        if let Some(port) = std::env::var("DB_PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(limit) = std::env::var("DB_CONNECTION_LIMIT")
            .ok()
            .and_then(|l| l.parse().ok())
        {
            config.connection_limit = limit;
        }
        config
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connection_limit(mut self, limit: u32) -> Self {
        self.connection_limit = limit;
        self
    }

    pub fn queue_limit(mut self, limit: u32) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn wait_for_connections(mut self, wait: bool) -> Self {
        self.wait_for_connections = wait;
        self
    }

    pub fn retry_policy(mut self, retries: u32, delay: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_delay = delay;
        self
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connection_limit", &self.connection_limit)
            .field("queue_limit", &self.queue_limit)
            .field("wait_for_connections", &self.wait_for_connections)
            .field("charset", &self.charset)
            .field("timezone", &self.timezone)
            .field("multiple_statements", &self.multiple_statements)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("enable_keep_alive", &self.enable_keep_alive)
            .field("keep_alive_initial_delay", &self.keep_alive_initial_delay)
            .field("connect_retries", &self.connect_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connection_limit() -> u32 {
    DEFAULT_CONNECTION_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

fn default_keep_alive_delay() -> Duration {
    DEFAULT_KEEP_ALIVE_DELAY
}

fn default_connect_retries() -> u32 {
    DEFAULT_CONNECT_RETRIES
}

fn default_retry_delay() -> Duration {
    DEFAULT_RETRY_DELAY
}
