//! Runtime configuration shared by the orchestrator and the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for a single registry lookup, matching the portal client's own timeout.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);
/// The portal is a single SOAP endpoint of unknown capacity; keep fan-out small.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 5;
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("registry timeout must be greater than zero")]
    ZeroTimeout,
    #[error("max concurrent lookups must be between 1 and {max}, got {got}")]
    Concurrency { got: usize, max: usize },
}

/// Tuning knobs for refreshes and sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(with = "secs")]
    pub registry_timeout: Duration,
    pub max_concurrent_lookups: usize,
    pub notification_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

impl MonitorConfig {
    const MAX_CONCURRENCY: usize = 32;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_concurrent_lookups == 0 || self.max_concurrent_lookups > Self::MAX_CONCURRENCY {
            return Err(ConfigError::Concurrency {
                got: self.max_concurrent_lookups,
                max: Self::MAX_CONCURRENCY,
            });
        }
        Ok(())
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
