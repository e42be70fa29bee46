//! Configuration types for scrape-orchestrator
//!
//! Everything is serde-deserializable with per-field defaults so a partial
//! configuration file (or an empty one) yields a working orchestrator.
//! [`Config::validate`] rejects values that would misbehave at runtime and
//! names the offending key.

use crate::error::{Error, Result};
use crate::types::SourceId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

/// Top-level orchestrator configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Default settings for a single operation run
    #[serde(default)]
    pub run: RunConfig,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// History retention and statistics window
    #[serde(default)]
    pub history: HistoryConfig,

    /// Cron-driven auto-trigger schedules
    #[serde(default)]
    pub cron: CronConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate the whole configuration, returning the first offending value
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        self.retry.validate()?;
        self.history.validate()?;
        self.cron.validate()?;
        Ok(())
    }
}

/// Per-operation run settings
///
/// These are the defaults for cron-fired operations; API callers may
/// override `timeout_per_task` and `max_retries` per start request.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RunConfig {
    /// Deadline for a single scrape attempt, in seconds (default: 120)
    #[serde(default = "default_timeout_per_task", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout_per_task: Duration,

    /// Number of retries after a failed attempt (default: 2)
    ///
    /// A task makes at most `max_retries + 1` attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Cap on concurrently running tasks within one operation
    ///
    /// None (the default) means one slot per requested source, since
    /// providers are independent sites.
    #[serde(default)]
    pub max_parallel_tasks: Option<usize>,
}

impl RunConfig {
    /// Maximum number of attempts a task may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Validate run settings
    pub fn validate(&self) -> Result<()> {
        if self.timeout_per_task.is_zero() {
            return Err(Error::Config {
                message: "timeout_per_task must be greater than zero".to_string(),
                key: Some("run.timeout_per_task".to_string()),
            });
        }
        if self.max_parallel_tasks == Some(0) {
            return Err(Error::Config {
                message: "max_parallel_tasks must be at least 1 when set".to_string(),
                key: Some("run.max_parallel_tasks".to_string()),
            });
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_per_task: default_timeout_per_task(),
            max_retries: default_max_retries(),
            max_parallel_tasks: None,
        }
    }
}

/// Retry backoff configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Delay before the first retry, in seconds (default: 1)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries, in seconds (default: 60)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryConfig {
    /// Validate retry settings
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::Config {
                message: "initial_delay must be greater than zero".to_string(),
                key: Some("retry.initial_delay".to_string()),
            });
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::Config {
                message: "max_delay must not be smaller than initial_delay".to_string(),
                key: Some("retry.max_delay".to_string()),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be at least 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// History retention and statistics window configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryConfig {
    /// Number of terminal operations kept in memory (default: 200)
    ///
    /// Oldest entries beyond the cap are evicted regardless of any query
    /// window.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Default statistics window in seconds (default: 30 days)
    #[serde(default = "default_statistics_window", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub default_window: Duration,
}

impl HistoryConfig {
    /// Validate history settings
    pub fn validate(&self) -> Result<()> {
        if self.retention == 0 {
            return Err(Error::Config {
                message: "retention must be at least 1".to_string(),
                key: Some("history.retention".to_string()),
            });
        }
        if self.default_window.is_zero() {
            return Err(Error::Config {
                message: "default_window must be greater than zero".to_string(),
                key: Some("history.default_window".to_string()),
            });
        }
        Ok(())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            default_window: default_statistics_window(),
        }
    }
}

/// Cron scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CronConfig {
    /// Whether the scheduler fires at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Configured schedules
    #[serde(default)]
    pub schedules: Vec<CronScheduleConfig>,
}

impl CronConfig {
    /// Validate schedule ids, sources, and expressions
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for schedule in &self.schedules {
            if schedule.id.is_empty() {
                return Err(Error::Config {
                    message: "schedule id must not be empty".to_string(),
                    key: Some("cron.schedules.id".to_string()),
                });
            }
            if !seen.insert(schedule.id.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate schedule id '{}'", schedule.id),
                    key: Some("cron.schedules.id".to_string()),
                });
            }
            if schedule.sources.is_empty() {
                return Err(Error::Config {
                    message: format!("schedule '{}' has no sources", schedule.id),
                    key: Some("cron.schedules.sources".to_string()),
                });
            }
            schedule.parse_expression()?;
        }
        Ok(())
    }
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedules: Vec::new(),
        }
    }
}

/// One cron-driven auto-trigger schedule
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CronScheduleConfig {
    /// Stable identifier used for status reporting and enable/disable toggles
    pub id: String,

    /// Sources this schedule starts an operation for
    pub sources: Vec<SourceId>,

    /// Cron expression with a seconds field, e.g. `"0 0 3 * * * *"` for
    /// 03:00 UTC daily
    pub expression: String,

    /// Whether this schedule is active (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl CronScheduleConfig {
    /// Parse the cron expression, mapping parser failures to [`Error::InvalidCron`]
    pub fn parse_expression(&self) -> Result<cron::Schedule> {
        cron::Schedule::from_str(&self.expression).map_err(|e| Error::InvalidCron {
            expression: self.expression.clone(),
            message: e.to_string(),
        })
    }
}

/// Server configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:7180)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_timeout_per_task() -> Duration {
    Duration::from_secs(120)
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retention() -> usize {
    200
}

fn default_statistics_window() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7180))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds on the wire)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
