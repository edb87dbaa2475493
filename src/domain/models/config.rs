use serde::{Deserialize, Serialize};

/// Main configuration structure for Metronome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Broker / publish configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Reminder scheduling and delivery configuration
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Duplicate-call suppression at the tool boundary
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Live-update broadcaster configuration
    #[serde(default)]
    pub broadcaster: BroadcasterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            broker: BrokerConfig::default(),
            reminders: ReminderConfig::default(),
            dedup: DedupConfig::default(),
            broadcaster: BroadcasterConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".metronome/metronome.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rotated log files. Stdout only when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
        }
    }
}

/// Broker / publish configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BrokerConfig {
    /// Maximum publish attempts before the failure surfaces to the caller
    #[serde(default = "default_publish_max_attempts")]
    pub publish_max_attempts: u32,

    /// Initial publish backoff delay in milliseconds
    #[serde(default = "default_publish_backoff_ms")]
    pub publish_initial_backoff_ms: u64,

    /// Maximum publish backoff delay in milliseconds
    #[serde(default = "default_publish_max_backoff_ms")]
    pub publish_max_backoff_ms: u64,

    /// Redeliveries of a message to a failing handler before dead-lettering
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,

    /// Concurrent in-flight handler invocations per subscription
    #[serde(default = "default_handler_concurrency")]
    pub handler_concurrency: u32,
}

const fn default_publish_max_attempts() -> u32 {
    3
}

const fn default_publish_backoff_ms() -> u64 {
    500
}

const fn default_publish_max_backoff_ms() -> u64 {
    10_000
}

const fn default_max_redeliveries() -> u32 {
    3
}

const fn default_handler_concurrency() -> u32 {
    8
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            publish_max_attempts: default_publish_max_attempts(),
            publish_initial_backoff_ms: default_publish_backoff_ms(),
            publish_max_backoff_ms: default_publish_max_backoff_ms(),
            max_redeliveries: default_max_redeliveries(),
            handler_concurrency: default_handler_concurrency(),
        }
    }
}

/// Reminder scheduling and delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReminderConfig {
    /// Maximum delivery attempts before a reminder is marked failed
    #[serde(default = "default_delivery_max_attempts")]
    pub delivery_max_attempts: u32,

    /// Initial delivery backoff delay in milliseconds
    #[serde(default = "default_delivery_backoff_ms")]
    pub delivery_initial_backoff_ms: u64,

    /// Maximum delivery backoff delay in milliseconds
    #[serde(default = "default_delivery_max_backoff_ms")]
    pub delivery_max_backoff_ms: u64,

    /// Webhook request timeout in seconds
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Sweep tick interval in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// How far ahead of the tick a pending reminder may fire, in seconds
    #[serde(default = "default_sweep_lookahead_secs")]
    pub sweep_lookahead_secs: u64,
}

const fn default_delivery_max_attempts() -> u32 {
    3
}

const fn default_delivery_backoff_ms() -> u64 {
    2_000
}

const fn default_delivery_max_backoff_ms() -> u64 {
    8_000
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

const fn default_sweep_interval_ms() -> u64 {
    1_000
}

const fn default_sweep_lookahead_secs() -> u64 {
    1
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            delivery_max_attempts: default_delivery_max_attempts(),
            delivery_initial_backoff_ms: default_delivery_backoff_ms(),
            delivery_max_backoff_ms: default_delivery_max_backoff_ms(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
            sweep_lookahead_secs: default_sweep_lookahead_secs(),
        }
    }
}

/// Duplicate-call suppression at the tool boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DedupConfig {
    /// Window in seconds during which a repeated (user, title) creation
    /// call is collapsed
    #[serde(default = "default_creation_ttl_secs")]
    pub creation_ttl_secs: u64,
}

const fn default_creation_ttl_secs() -> u64 {
    30
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            creation_ttl_secs: default_creation_ttl_secs(),
        }
    }
}

/// Live-update broadcaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BroadcasterConfig {
    /// Maximum concurrent live connections per user
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: u32,

    /// New connections allowed per user per minute
    #[serde(default = "default_connections_per_minute")]
    pub connections_per_minute: u32,
}

const fn default_max_connections_per_user() -> u32 {
    3
}

const fn default_connections_per_minute() -> u32 {
    10
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            max_connections_per_user: default_max_connections_per_user(),
            connections_per_minute: default_connections_per_minute(),
        }
    }
}
