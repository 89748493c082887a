//! Relays security-event alerts from a Pub/Sub subscription to a Teams webhook.

pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod listener;
pub mod model;
pub mod source;

pub use config::RelayConfig;
pub use delivery::{Acknowledge, Delivery};
pub use dispatcher::{AlertSink, TeamsWebhook};
pub use error::{BackendError, ConfigError, DeliveryError, HandlerError};
pub use handler::{AlertFilter, MessageHandler, NeverAlert, RelayHandler};
pub use listener::{ListenReport, Listener, Termination};
pub use source::{MessageSource, PubsubSource};
