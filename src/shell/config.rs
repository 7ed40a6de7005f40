// Runtime configuration read from the environment.
//
// Every setting has a default; a variable that is set but malformed is an error rather
// than silently falling back.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::shared::infrastructure::outbox::dispatcher::DispatcherConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxConfig {
    pub batch_size: usize,
    pub claim_timeout: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub sweep_interval: Duration,
    pub workers: usize,
    pub publish_concurrency: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            claim_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(1_000),
            max_attempts: 5,
            sweep_interval: Duration::from_secs(60),
            workers: 1,
            publish_concurrency: 8,
        }
    }
}

impl OutboxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            batch_size: read(&lookup, "OUTBOX_BATCH_SIZE", defaults.batch_size)?,
            claim_timeout: Duration::from_secs(read(
                &lookup,
                "OUTBOX_CLAIM_TIMEOUT_SECS",
                defaults.claim_timeout.as_secs(),
            )?),
            poll_interval: Duration::from_millis(read(
                &lookup,
                "OUTBOX_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            max_attempts: read(&lookup, "OUTBOX_MAX_ATTEMPTS", defaults.max_attempts)?,
            sweep_interval: Duration::from_secs(read(
                &lookup,
                "OUTBOX_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            workers: read(&lookup, "OUTBOX_WORKERS", defaults.workers)?,
            publish_concurrency: read(
                &lookup,
                "OUTBOX_PUBLISH_CONCURRENCY",
                defaults.publish_concurrency,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("OUTBOX_BATCH_SIZE", self.batch_size == 0),
            ("OUTBOX_CLAIM_TIMEOUT_SECS", self.claim_timeout.is_zero()),
            ("OUTBOX_POLL_INTERVAL_MS", self.poll_interval.is_zero()),
            ("OUTBOX_MAX_ATTEMPTS", self.max_attempts == 0),
            ("OUTBOX_SWEEP_INTERVAL_SECS", self.sweep_interval.is_zero()),
            ("OUTBOX_WORKERS", self.workers == 0),
            ("OUTBOX_PUBLISH_CONCURRENCY", self.publish_concurrency == 0),
        ];
        match checks.into_iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ConfigError::Zero { name }),
            None => Ok(()),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            publish_concurrency: self.publish_concurrency,
        }
    }
}

fn read<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
    }
}
