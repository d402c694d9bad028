//! Service configuration loaded via OrthoConfig.
//!
//! Values come from `REVIEW_*` environment variables, command-line flags or a
//! configuration file, in the precedence OrthoConfig applies.

use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::outbound::persistence::PoolConfig;

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Configuration values that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// `log_format` is neither `json` nor `pretty`.
    #[error("unsupported log format: {value}")]
    InvalidLogFormat { value: String },
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(SettingsError::InvalidLogFormat {
                value: value.to_owned(),
            }),
        }
    }
}

/// Settings for the review assignment service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REVIEW")]
pub struct ServiceSettings {
    /// PostgreSQL URL; without one the service runs on the in-memory store.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Idle connections kept open by the pool.
    #[ortho_config(default = 2)]
    pub pool_min_idle: u32,
    /// Connection checkout timeout in milliseconds.
    #[ortho_config(default = 30000)]
    pub connection_timeout_ms: u64,
    /// Deadline applied to each engine operation, in milliseconds.
    #[ortho_config(default = 5000)]
    pub operation_timeout_ms: u64,
    /// Fixed seed for reviewer selection; random when absent.
    pub reviewer_seed: Option<u64>,
    /// `json` (default) or `pretty`.
    pub log_format: Option<String>,
}

impl ServiceSettings {
    /// Pool configuration, or `None` when no database is configured.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        self.database_url.as_ref().map(|url| {
            PoolConfig::new(url)
                .with_max_size(self.pool_max_size)
                .with_min_idle(Some(self.pool_min_idle))
                .with_connection_timeout(Duration::from_millis(self.connection_timeout_ms))
        })
    }

    /// Per-operation deadline used to build request contexts.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Parsed log format, defaulting to JSON.
    pub fn log_format(&self) -> Result<LogFormat, SettingsError> {
        self.log_format
            .as_deref()
            .map_or(Ok(LogFormat::default()), LogFormat::from_str)
    }
}
