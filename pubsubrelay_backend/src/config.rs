//! Relay configuration, read once from the environment at startup.
//!
//! Required variables are validated eagerly: a missing `PROJECT_ID`,
//! `SUBSCRIPTION_ID` or `MICROSOFT_WEBHOOK_URL` is reported by name instead of
//! surfacing later as a connection or delivery failure.

use std::time::Duration;

use figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::{error::ConfigError, model::SubscriptionRef};

pub const PROJECT_ID: &str = "PROJECT_ID";
pub const SUBSCRIPTION_ID: &str = "SUBSCRIPTION_ID";
pub const MICROSOFT_WEBHOOK_URL: &str = "MICROSOFT_WEBHOOK_URL";
pub const PULL_TIMEOUT_SECS: &str = "PULL_TIMEOUT_SECS";
pub const CANCEL_GRACE_SECS: &str = "CANCEL_GRACE_SECS";
pub const CHANNEL_CAPACITY: &str = "CHANNEL_CAPACITY";
pub const WEBHOOK_TIMEOUT_SECS: &str = "WEBHOOK_TIMEOUT_SECS";

const KEYS: &[&str] = &[
    PROJECT_ID,
    SUBSCRIPTION_ID,
    MICROSOFT_WEBHOOK_URL,
    PULL_TIMEOUT_SECS,
    CANCEL_GRACE_SECS,
    CHANNEL_CAPACITY,
    WEBHOOK_TIMEOUT_SECS,
];

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub subscription: SubscriptionRef,
    pub webhook_url: String,
    /// How long one listen cycle runs before it is cancelled.
    pub pull_timeout: Duration,
    /// Upper bound on waiting for the stream to stop after cancellation.
    pub cancel_grace: Duration,
    /// Capacity of the channel between the stream and the handler loop.
    pub channel_capacity: usize,
    pub webhook_timeout: Duration,
    /// Project id to use when talking to the Pub/Sub emulator.
    pub emulator_project_id: Option<String>,
}

/// The environment as figment sees it. Keys are lowercased by `Env::raw`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    project_id: Option<String>,
    subscription_id: Option<String>,
    microsoft_webhook_url: Option<String>,
    #[serde(default = "default_pull_timeout")]
    pull_timeout_secs: f64,
    #[serde(default = "default_cancel_grace")]
    cancel_grace_secs: f64,
    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,
    #[serde(default = "default_webhook_timeout")]
    webhook_timeout_secs: f64,
}

fn default_pull_timeout() -> f64 {
    5.0
}

fn default_cancel_grace() -> f64 {
    5.0
}

fn default_channel_capacity() -> usize {
    10
}

fn default_webhook_timeout() -> f64 {
    10.0
}

impl RelayConfig {
    /// Loads and validates the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::from(Env::raw().only(KEYS)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawConfig = figment.extract().map_err(Box::new)?;

        let project_id = required(PROJECT_ID, raw.project_id)?;
        let subscription_id = required(SUBSCRIPTION_ID, raw.subscription_id)?;
        let webhook_url = required(MICROSOFT_WEBHOOK_URL, raw.microsoft_webhook_url)?;

        let channel_capacity = match raw.channel_capacity {
            0 => {
                return Err(ConfigError::Invalid {
                    name: CHANNEL_CAPACITY,
                    reason: "must be at least 1".to_string(),
                })
            }
            n => n,
        };

        Ok(Self {
            subscription: SubscriptionRef::new(project_id, subscription_id),
            webhook_url,
            pull_timeout: positive_secs(PULL_TIMEOUT_SECS, raw.pull_timeout_secs)?,
            cancel_grace: positive_secs(CANCEL_GRACE_SECS, raw.cancel_grace_secs)?,
            channel_capacity,
            webhook_timeout: positive_secs(WEBHOOK_TIMEOUT_SECS, raw.webhook_timeout_secs)?,
            emulator_project_id: None,
        })
    }

    pub fn with_pull_timeout(mut self, secs: f64) -> Result<Self, ConfigError> {
        self.pull_timeout = positive_secs(PULL_TIMEOUT_SECS, secs)?;
        Ok(self)
    }

    pub fn with_emulator_project_id(mut self, emulator_project_id: Option<String>) -> Self {
        self.emulator_project_id = emulator_project_id;
        self
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn positive_secs(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    let duration = Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;

    if duration.is_zero() {
        return Err(ConfigError::non_positive(name, duration));
    }

    Ok(duration)
}
