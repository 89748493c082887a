use async_trait::async_trait;
use futures_util::{FutureExt, Stream, StreamExt};
use google_cloud_gax::conn::Environment;
use google_cloud_pubsub::{
    client::{Client, ClientConfig},
    subscription::SubscribeConfig,
};
use log::{debug, info, warn};
use tokio::{select, sync::mpsc::Sender};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RelayConfig,
    delivery::{Acknowledge, Delivery},
    error::BackendError,
    model::SubscriptionRef,
};

/// A streaming source of deliveries, e.g. a Pub/Sub subscription.
#[async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Describes what is being listened to, for logging.
    fn describe(&self) -> String;

    /// Streams deliveries into `tx` until `cancel` fires, the receiving side
    /// goes away, or the stream fails. Returning `Ok` without cancellation means
    /// the source ran to completion.
    async fn run(
        &self,
        tx: Sender<Delivery>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError>;
}

/// Streaming pull against a Google Cloud Pub/Sub subscription.
pub struct PubsubSource {
    client: Client,
    subscription: SubscriptionRef,
    channel_capacity: usize,
}

impl PubsubSource {
    pub async fn connect(config: &RelayConfig) -> Result<Self, BackendError> {
        let (client, project_id) = create_client(
            &config.subscription.project_id,
            config.emulator_project_id.clone(),
        )
        .await?;

        Ok(Self {
            client,
            subscription: SubscriptionRef::new(
                project_id,
                config.subscription.subscription_id.clone(),
            ),
            channel_capacity: config.channel_capacity.max(1),
        })
    }
}

#[async_trait]
impl MessageSource for PubsubSource {
    fn describe(&self) -> String {
        self.subscription.path()
    }

    async fn run(
        &self,
        tx: Sender<Delivery>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError> {
        let subscription = self.client.subscription(&self.subscription.path());
        // Bound the client's own queue too, or it buffers every leased message.
        let subscribe_config =
            SubscribeConfig::default().with_channel_capacity(self.channel_capacity);
        let mut stream = subscription.subscribe(Some(subscribe_config)).await?;

        loop {
            select! {
                _ = cancel.cancelled() => {
                    let released = release_ready(&mut stream).await;
                    debug!(
                        "Streaming pull on {} cancelled, released {released}",
                        self.subscription
                    );
                    return Ok(());
                }
                message = stream.next() => match message {
                    Some(message) => {
                        if let Err(unsent) = tx.send(Delivery::from(message)).await {
                            let released = 1 + release_ready(&mut stream).await;
                            if let Err(e) = unsent.0.nack().await {
                                warn!("Failed to release message: {e}");
                            }
                            debug!("Delivery channel closed, released {released}");
                            return Ok(());
                        }
                    }
                    None => return Err(BackendError::StreamClosed(self.subscription.path())),
                }
            }
        }
    }
}

/// Nacks every message the stream has already received, without waiting for more.
pub(crate) async fn release_ready<St, M>(stream: &mut St) -> usize
where
    St: Stream<Item = M> + Unpin,
    M: Acknowledge,
{
    let mut released = 0;
    while let Some(Some(message)) = stream.next().now_or_never() {
        if let Err(e) = message.nack().await {
            warn!("Failed to release message: {e}");
        }
        released += 1;
    }
    released
}

/// Returns the client together with the project id it ended up configured for.
async fn create_client(
    project_id: &str,
    emulator_project_id: Option<String>,
) -> Result<(Client, String), BackendError> {
    let mut config = ClientConfig::default()
        .with_auth()
        .await
        .map_err(|e| BackendError::Auth(e.to_string()))?;

    let mut project_id = project_id.to_string();

    if let (Environment::Emulator(host), Some(emulator_project_id)) =
        (&config.environment, emulator_project_id)
    {
        info!("Using Pub/Sub emulator at {host} with project {emulator_project_id}");
        project_id = emulator_project_id;
    }

    config.project_id = Some(project_id.clone());

    let client = Client::new(config)
        .await
        .map_err(|e| BackendError::Connect(e.to_string()))?;

    Ok((client, project_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Clone, Default)]
    struct CountingNack(Arc<AtomicUsize>);

    #[async_trait]
    impl Acknowledge for CountingNack {
        async fn ack(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn nack(&self) -> Result<(), BackendError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn releases_only_ready_messages() {
        let nacks = CountingNack::default();
        let mut pending = stream::iter(vec![nacks.clone(), nacks.clone(), nacks.clone()])
            .chain(stream::pending());

        let released = release_ready(&mut pending).await;

        assert_eq!(released, 3);
        assert_eq!(nacks.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn releases_nothing_from_idle_stream() {
        let mut idle = stream::pending::<CountingNack>();

        assert_eq!(release_ready(&mut idle).await, 0);
    }

    #[tokio::test]
    async fn stops_at_end_of_stream() {
        let nacks = CountingNack::default();
        let mut finite = stream::iter(vec![nacks.clone()]);

        assert_eq!(release_ready(&mut finite).await, 1);
        assert_eq!(nacks.0.load(Ordering::SeqCst), 1);
    }
}
