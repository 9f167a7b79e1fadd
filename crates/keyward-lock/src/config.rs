//! Lock configuration
//!
//! Layered like the server configuration: an optional file, then
//! `KEYWARD_*` environment variables (nested keys joined with `__`, e.g.
//! `KEYWARD_RETRY__MAX_BACKOFF_MS`).

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use keyward_common::{
    DEFAULT_LEASE_MS, DEFAULT_NAMESPACE, DEFAULT_RENEW_RATIO, DEFAULT_RENEW_TIMEOUT_MS,
    DEFAULT_WATCHDOG_LEASE_MS,
};

use crate::error::{LockError, LockResult};
use crate::key::LockKey;
use crate::retry::RetryPolicy;
use crate::watchdog::WatchdogSettings;

const ENV_PREFIX: &str = "KEYWARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Namespace prefixed to lock names
    pub namespace: String,
    /// Lease of non-watchdog locks in milliseconds
    pub lease_ms: u64,
    /// Lease written by leased locks and extended by their watchdog
    pub watchdog_lease_ms: u64,
    /// The watchdog renews every `watchdog_lease_ms / renew_ratio`
    pub renew_ratio: u32,
    /// Upper bound on one watchdog renewal call
    pub renew_timeout_ms: u64,
    /// Backoff of blocking acquisition
    pub retry: RetryConfig,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            lease_ms: DEFAULT_LEASE_MS,
            watchdog_lease_ms: DEFAULT_WATCHDOG_LEASE_MS,
            renew_ratio: DEFAULT_RENEW_RATIO,
            renew_timeout_ms: DEFAULT_RENEW_TIMEOUT_MS,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 1.0 gives a fixed backoff
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl LockConfig {
    /// Load from an optional file plus `KEYWARD_*` environment variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: LockConfig = builder
            .build()
            .context("Failed to build lock configuration")?
            .try_deserialize()
            .context("Failed to deserialize lock configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LockResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(LockError::IllegalArgument(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.lease_ms == 0 {
            return Err(LockError::IllegalArgument(
                "lease_ms must be greater than zero".to_string(),
            ));
        }
        self.watchdog_settings()?;
        self.retry_policy().validate()?;
        Ok(())
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn watchdog_settings(&self) -> LockResult<WatchdogSettings> {
        WatchdogSettings::from_lease(
            Duration::from_millis(self.watchdog_lease_ms),
            self.renew_ratio,
            Duration::from_millis(self.renew_timeout_ms),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
            jitter: self.retry.jitter,
        }
    }

    /// `namespace::name` key in the configured namespace
    pub fn key(&self, name: &str) -> LockResult<LockKey> {
        LockKey::namespaced(&self.namespace, name)
    }
}
