//! # Node Configuration
//!
//! Host identity, reporter cadence and the router configuration, all read
//! from the environment. Configuration files are not supported.

use std::time::Duration;

use packet_router::{ConfigError, RouterConfig};
use shared_types::HostIdentity;

/// Environment variable names read by [`NodeConfig::from_env`].
pub mod env {
    pub const HOST_NAME: &str = "RELAY_HOST_NAME";
    pub const HOSTNAME_FALLBACK: &str = "HOSTNAME";
    pub const HOST_ADDR: &str = "RELAY_HOST_ADDR";
    pub const STATS_INTERVAL_SECS: &str = "RELAY_STATS_INTERVAL_SECS";
}

/// Host name used when neither variable is set.
pub const DEFAULT_HOST_NAME: &str = "localhost";

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Name of this relay instance.
    pub host_name: String,
    /// Network address advertised in provenance, if any.
    pub host_addr: Option<String>,
    /// How often the statistics summary is logged.
    pub stats_interval: Duration,
    /// Router capacities and timeouts.
    pub router: RouterConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host_name: DEFAULT_HOST_NAME.to_string(),
            host_addr: None,
            stats_interval: Duration::from_secs(30),
            router: RouterConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError` if a variable does not parse or a value is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`Self::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// `ConfigError` if a variable does not parse or a value is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_blank = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host_name = non_blank(env::HOST_NAME)
            .or_else(|| non_blank(env::HOSTNAME_FALLBACK))
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.host_name);

        let stats_interval = match lookup(env::STATS_INTERVAL_SECS) {
            None => defaults.stats_interval,
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidEnv {
                    var: env::STATS_INTERVAL_SECS,
                    value,
                })?,
        };

        let config = Self {
            host_name,
            host_addr: non_blank(env::HOST_ADDR).map(|v| v.trim().to_string()),
            stats_interval,
            router: RouterConfig::from_lookup(&lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set the host name
    #[must_use]
    pub fn with_host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = name.into();
        self
    }

    /// Builder-style method to set the statistics report interval
    #[must_use]
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Builder-style method to set the router configuration
    #[must_use]
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    /// # Errors
    ///
    /// `ConfigError::Zero` for a zero report interval or router setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stats_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "stats_interval",
            });
        }
        self.router.validate()
    }

    /// Fresh identity for this run: new uuid, start time now.
    #[must_use]
    pub fn host_identity(&self) -> HostIdentity {
        let host = HostIdentity::new(self.host_name.clone());
        match &self.host_addr {
            Some(addr) => host.with_addr(addr.clone()),
            None => host,
        }
    }
}
