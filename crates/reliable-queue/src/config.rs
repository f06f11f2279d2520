//! Queue and connection pool configuration.

use crate::error::ConfigurationError;
use crate::keys::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable prefix, e.g. `RQ__POOL__MAX_IDLE=5`
pub const ENV_PREFIX: &str = "RQ";

/// Settings shared by every queue built from one factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Prefix of every list key
    pub namespace: String,

    /// Upper bound of a single blocking claim attempt, in milliseconds
    pub poll_timeout_ms: u64,

    /// Connection pool settings
    pub pool: PoolConfig,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            poll_timeout_ms: 2000,
            pool: PoolConfig::default(),
        }
    }
}

impl QueueSettings {
    /// Load settings from files and the environment.
    ///
    /// Sources, later ones overriding earlier ones:
    ///  1. `config/queue.yaml` when present
    ///  2. `explicit_path`, which must exist when given
    ///  3. Environment variables prefixed `RQ__`
    pub fn load(explicit_path: Option<&str>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name("config/queue")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        if let Some(path) = explicit_path {
            builder = builder.add_source(
                config::File::with_name(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            tracing::info!(path = %path, "Loading queue configuration from explicit path");
        }

        let settings: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would produce unusable queues
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.namespace.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "namespace".to_string(),
            });
        }
        if self.namespace.contains(':') {
            return Err(ConfigurationError::Invalid {
                message: "namespace must not contain ':'".to_string(),
            });
        }
        // A zero timeout makes the storage block forever, so cancellation
        // would never be observed.
        if self.poll_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid {
                message: "poll_timeout_ms must be greater than zero".to_string(),
            });
        }
        self.pool.validate()
    }

    /// Bounded wait of one claim attempt
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Connection pool configuration, fixed for the lifetime of a factory
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of idle connections kept warm
    pub max_idle: usize,

    /// Seconds after which an idle connection is recycled
    pub idle_timeout_seconds: u64,

    /// Address and credentials of the storage service
    pub dial_target: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 3,
            idle_timeout_seconds: 240,
            dial_target: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.dial_target.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "pool.dial_target".to_string(),
            });
        }
        if self.idle_timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "pool.idle_timeout_seconds must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

// The dial target may carry a password, so it is never printed.
impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("max_idle", &self.max_idle)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("dial_target", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
