use async_trait::async_trait;
use google_cloud_pubsub::subscriber::ReceivedMessage;

use crate::{error::BackendError, model::PubsubMessage};

/// Settles a delivery with the queue.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BackendError>;

    /// Releases the message for immediate redelivery.
    async fn nack(&self) -> Result<(), BackendError>;
}

#[async_trait]
impl Acknowledge for ReceivedMessage {
    async fn ack(&self) -> Result<(), BackendError> {
        ReceivedMessage::ack(self).await.map_err(BackendError::from)
    }

    async fn nack(&self) -> Result<(), BackendError> {
        ReceivedMessage::nack(self).await.map_err(BackendError::from)
    }
}

/// One delivery attempt of a message. It must be settled with [`Delivery::ack`];
/// a delivery dropped unsettled is redelivered once its ack deadline passes.
pub struct Delivery {
    message: PubsubMessage,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(message: PubsubMessage, acker: impl Acknowledge + 'static) -> Self {
        Self {
            message,
            acker: Box::new(acker),
        }
    }

    pub fn message(&self) -> &PubsubMessage {
        &self.message
    }

    /// Acknowledges the delivery and hands back the message.
    pub async fn ack(self) -> Result<PubsubMessage, BackendError> {
        self.acker.ack().await?;
        Ok(self.message)
    }

    pub async fn nack(self) -> Result<(), BackendError> {
        self.acker.nack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl From<ReceivedMessage> for Delivery {
    fn from(value: ReceivedMessage) -> Self {
        let message = PubsubMessage::from(value.message.clone());
        Self::new(message, value)
    }
}
