// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bus configuration
//!
//! | Variable                  | Default                 |
//! |---------------------------|-------------------------|
//! | `NATS_URL`                | `nats://localhost:4222` |
//! | `BUS_CLIENT_NAME`         | `activity-tracking-bus` |
//! | `BUS_RETRY_INTERVAL_MS`   | `1500`                  |
//! | `BUS_DRAIN_INTERVAL_SECS` | `300`                   |
//! | `BUS_LOGGER`              | `false`                 |
//! | `BUS_OUTBOX_DIR`          | `outbox`                |
//! | `BUS_DEAD_LETTER_AFTER`   | unset (retry forever)   |
//!
//! `NATS_URL` accepts a comma separated list of servers.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::broker::NatsConfig;
use crate::connection::RetryPolicy;
use crate::errors::{BusError, BusResult};
use crate::replay::{ReplayConfig, DEFAULT_DRAIN_INTERVAL};

/// Delay between connection attempts unless configured
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1500);

/// Everything the worker needs to start
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker connection settings shared by both bus connections
    pub nats: NatsConfig,
    /// Fixed delay between connection attempts
    pub retry_interval: Duration,
    /// Pause between outbox drains
    pub drain_interval: Duration,
    /// Diagnostic logging of bus traffic
    pub logger: bool,
    /// Directory of the file-backed outbox
    pub outbox_dir: PathBuf,
    /// Quarantine threshold for outbox records
    pub dead_letter_after: Option<u32>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            logger: false,
            outbox_dir: PathBuf::from("outbox"),
            dead_letter_after: None,
        }
    }
}

impl BusConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BusResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> BusResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(urls) = lookup("NATS_URL") {
            let servers: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
            if servers.is_empty() {
                return Err(BusError::Configuration("NATS_URL is empty".to_string()));
            }
            config.nats.servers = servers;
        }
        if let Some(name) = lookup("BUS_CLIENT_NAME") {
            config.nats.name = name;
        }
        if let Some(millis) = parse::<u64>(&lookup, "BUS_RETRY_INTERVAL_MS")? {
            config.retry_interval = Duration::from_millis(millis);
        }
        if let Some(secs) = parse::<u64>(&lookup, "BUS_DRAIN_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(BusError::Configuration(
                    "BUS_DRAIN_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            config.drain_interval = Duration::from_secs(secs);
        }
        if let Some(enabled) = parse::<bool>(&lookup, "BUS_LOGGER")? {
            config.logger = enabled;
        }
        if let Some(dir) = lookup("BUS_OUTBOX_DIR") {
            config.outbox_dir = PathBuf::from(dir);
        }
        config.dead_letter_after = parse::<u32>(&lookup, "BUS_DEAD_LETTER_AFTER")?;

        Ok(config)
    }

    /// Settings for the replay task
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            drain_interval: self.drain_interval,
            retry_policy: RetryPolicy::Fixed(self.retry_interval),
            dead_letter_after: self.dead_letter_after,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> BusResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| BusError::Configuration(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
