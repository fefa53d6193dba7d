//! Router configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use packet_router::RouterConfig;
//! use std::time::Duration;
//!
//! let config = RouterConfig::default()
//!     .with_consumer_capacity(64)
//!     .with_delivery_timeout(Duration::from_millis(10));
//! config.validate()?;
//! ```

use std::time::Duration;

use shared_bus::{DEFAULT_CONSUMER_CAPACITY, DEFAULT_INGRESS_CAPACITY};
use thiserror::Error;

/// Environment variable names read by [`RouterConfig::from_env`].
pub mod env {
    pub const INGRESS_CAPACITY: &str = "RELAY_INGRESS_CAPACITY";
    pub const CONSUMER_CAPACITY: &str = "RELAY_CONSUMER_CAPACITY";
    pub const DELIVERY_TIMEOUT_MS: &str = "RELAY_DELIVERY_TIMEOUT_MS";
    pub const SUBMIT_TIMEOUT_MS: &str = "RELAY_SUBMIT_TIMEOUT_MS";
    pub const EXPAND_STATISTICS_KEYS: &str = "RELAY_EXPAND_STATISTICS_KEYS";
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A capacity or timeout is zero.
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    /// An environment variable does not parse.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Ingress queue capacity per producing device.
    pub ingress_capacity: usize,
    /// Inbound queue capacity per consumer.
    pub consumer_capacity: usize,
    /// Bounded wait for room in a full consumer queue before dropping.
    pub delivery_timeout: Duration,
    /// Bounded wait for room in a full ingress queue on `submit`.
    pub submit_timeout: Duration,
    /// Count each sequence element as its own statistics key.
    pub expand_statistics_keys: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            consumer_capacity: DEFAULT_CONSUMER_CAPACITY,
            delivery_timeout: Duration::from_millis(50),
            submit_timeout: Duration::from_millis(100),
            expand_statistics_keys: false,
        }
    }
}

impl RouterConfig {
    /// Reject zero capacities and timeouts.
    ///
    /// # Errors
    ///
    /// `ConfigError::Zero` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingress_capacity == 0 {
            return Err(ConfigError::Zero { field: "ingress_capacity" });
        }
        if self.consumer_capacity == 0 {
            return Err(ConfigError::Zero { field: "consumer_capacity" });
        }
        if self.delivery_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "delivery_timeout" });
        }
        if self.submit_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "submit_timeout" });
        }
        Ok(())
    }

    /// Defaults overridden by `RELAY_*` environment variables, validated.
    ///
    /// # Errors
    ///
    /// `ConfigError` if a variable does not parse or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`Self::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// `ConfigError` if a variable does not parse or the result is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(n) = parse_var(&lookup, env::INGRESS_CAPACITY)? {
            config.ingress_capacity = n;
        }
        if let Some(n) = parse_var(&lookup, env::CONSUMER_CAPACITY)? {
            config.consumer_capacity = n;
        }
        if let Some(ms) = parse_var(&lookup, env::DELIVERY_TIMEOUT_MS)? {
            config.delivery_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, env::SUBMIT_TIMEOUT_MS)? {
            config.submit_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(env::EXPAND_STATISTICS_KEYS) {
            config.expand_statistics_keys = parse_flag(env::EXPAND_STATISTICS_KEYS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set the ingress capacity
    #[must_use]
    pub fn with_ingress_capacity(mut self, capacity: usize) -> Self {
        self.ingress_capacity = capacity;
        self
    }

    /// Builder-style method to set the consumer capacity
    #[must_use]
    pub fn with_consumer_capacity(mut self, capacity: usize) -> Self {
        self.consumer_capacity = capacity;
        self
    }

    /// Builder-style method to set the delivery timeout
    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Builder-style method to set the submit timeout
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Builder-style method to expand sequences in statistics keys
    #[must_use]
    pub fn with_expanded_statistics_keys(mut self, expand: bool) -> Self {
        self.expand_statistics_keys = expand;
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}
