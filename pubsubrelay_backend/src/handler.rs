use async_trait::async_trait;
use log::info;

use crate::{
    delivery::Delivery,
    dispatcher::AlertSink,
    error::HandlerError,
    model::PubsubMessage,
};

/// Processes one delivery. Implementations are responsible for settling it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError>;
}

/// Decides whether a message carries a finding worth alerting on, and renders
/// the alert text if so.
pub trait AlertFilter: Send + Sync {
    fn select(&self, message: &PubsubMessage) -> Option<String>;
}

impl<F> AlertFilter for F
where
    F: Fn(&PubsubMessage) -> Option<String> + Send + Sync,
{
    fn select(&self, message: &PubsubMessage) -> Option<String> {
        self(message)
    }
}

/// Forwards nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverAlert;

impl AlertFilter for NeverAlert {
    fn select(&self, _message: &PubsubMessage) -> Option<String> {
        None
    }
}

/// Logs every message, acknowledges it, and forwards the ones the filter
/// selects to the alert sink.
pub struct RelayHandler<F, S> {
    filter: F,
    sink: S,
}

impl<F, S> RelayHandler<F, S>
where
    F: AlertFilter,
    S: AlertSink,
{
    pub fn new(filter: F, sink: S) -> Self {
        Self { filter, sink }
    }
}

#[async_trait]
impl<F, S> MessageHandler for RelayHandler<F, S>
where
    F: AlertFilter,
    S: AlertSink,
{
    async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
        log_message(delivery.message());

        let message = delivery.ack().await.map_err(HandlerError::Ack)?;

        if let Some(text) = self.filter.select(&message) {
            self.sink.send_alert(&text).await?;
        }

        Ok(())
    }
}

fn log_message(message: &PubsubMessage) {
    info!("Received {}.", message.data_text());

    if !message.attributes.is_empty() {
        info!("Attributes:");
        let mut attributes: Vec<_> = message.attributes.iter().collect();
        attributes.sort();
        for (key, value) in attributes {
            info!("{key}: {value}");
        }
    }
}
