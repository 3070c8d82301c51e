//! Clock configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one clock.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Name used for the worker thread and in logs.
    pub name: String,

    /// Tick period of a self-ticking clock, in milliseconds.
    /// Ignored by manual clocks.
    pub period_ms: u64,

    /// How many propagation errors the clock buffers before dropping new ones.
    pub error_capacity: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            name: "clock".to_string(),
            period_ms: 10,
            error_capacity: 256,
        }
    }
}

impl ClockConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the tick period, in whole milliseconds.
    ///
    /// Sub-millisecond parts are dropped, so a period below one millisecond
    /// becomes zero and is rejected by [`period`](Self::period).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Tick period of a self-ticking clock.
    pub fn period(&self) -> Result<Duration, ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::InvalidPeriod {
                name: self.name.clone(),
            });
        }
        Ok(Duration::from_millis(self.period_ms))
    }
}
