use std::time::Duration;

use google_cloud_gax::grpc::Status;
use thiserror::Error;

/// Fatal failures of the Pub/Sub side of the relay.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to authenticate Pub/Sub client: {0}")]
    Auth(String),

    #[error("failed to create Pub/Sub client: {0}")]
    Connect(String),

    #[error("Pub/Sub request failed: {0}")]
    Status(#[from] Status),

    #[error("message stream for {0} closed unexpectedly")]
    StreamClosed(String),

    #[error("message pump task failed: {0}")]
    Pump(#[from] tokio::task::JoinError),

    #[error("message source stopped: {0}")]
    Source(String),
}

/// Failure to deliver an alert to the webhook. Never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook URL is not configured")]
    NotConfigured,

    #[error("invalid webhook URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected alert with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Failure while handling a single delivery. Logged, never fatal to a listen cycle.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to acknowledge message: {0}")]
    Ack(#[source] BackendError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Invalid or incomplete relay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl ConfigError {
    pub(crate) fn non_positive(name: &'static str, value: Duration) -> Self {
        Self::Invalid {
            name,
            reason: format!("expected a positive duration, got {value:?}"),
        }
    }
}
