//! Timeout-bounded listening on a message source.
//!
//! The source streams deliveries from a background task into a bounded
//! channel; a single loop here pulls them off and hands them to the handler.
//! When the listen window elapses the stream is cancelled, and the pump task
//! is then given at most the grace period to confirm it has stopped.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    select,
    sync::mpsc::{self, Receiver},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RelayConfig, delivery::Delivery, error::BackendError, handler::MessageHandler,
    source::MessageSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The listen window elapsed and the stream was cancelled.
    TimedOut,
    /// The source finished by itself before the window elapsed.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenReport {
    pub termination: Termination,
    /// Deliveries passed to the handler.
    pub handled: usize,
    /// Deliveries still queued at cancellation, released for redelivery.
    pub released: usize,
}

pub struct Listener<S> {
    source: Arc<S>,
    channel_capacity: usize,
    cancel_grace: Duration,
}

impl<S: MessageSource> Listener<S> {
    pub fn new(source: S, config: &RelayConfig) -> Self {
        Self {
            source: Arc::new(source),
            channel_capacity: config.channel_capacity.max(1),
            cancel_grace: config.cancel_grace,
        }
    }

    pub fn with_settings(source: S, channel_capacity: usize, cancel_grace: Duration) -> Self {
        Self {
            source: Arc::new(source),
            channel_capacity: channel_capacity.max(1),
            cancel_grace,
        }
    }

    /// Listens for up to `window`, passing each delivery to `handler`.
    ///
    /// Running out the window is a normal termination. Any failure of the
    /// underlying stream is returned as an error.
    pub async fn listen(
        &self,
        handler: &impl MessageHandler,
        window: Duration,
    ) -> Result<ListenReport, BackendError> {
        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();

        let source = self.source.clone();
        let pump_cancel = cancel.clone();
        let mut pump = tokio::spawn(async move { source.run(tx, pump_cancel).await });

        info!("Listening for messages on {}..", self.source.describe());

        let deadline = sleep(window);
        tokio::pin!(deadline);

        let mut handled = 0;

        loop {
            select! {
                biased;

                _ = &mut deadline => break,
                Some(delivery) = rx.recv() => {
                    handle(handler, delivery).await;
                    handled += 1;
                }
                result = &mut pump => {
                    // The sender is gone, so whatever is still buffered was
                    // received before the source stopped.
                    while let Ok(delivery) = rx.try_recv() {
                        handle(handler, delivery).await;
                        handled += 1;
                    }
                    result??;
                    info!("Message source completed after {handled} message(s)");
                    return Ok(ListenReport {
                        termination: Termination::Completed,
                        handled,
                        released: 0,
                    });
                }
            }
        }

        debug!("Listen window of {window:?} elapsed, cancelling stream");
        cancel.cancel();
        rx.close();

        // Release what is buffered even if the source failed while stopping.
        let shutdown = self.await_shutdown(&mut pump).await;
        let released = release_pending(&mut rx).await;
        shutdown?;

        info!("Stopped listening after {handled} message(s), released {released}");

        Ok(ListenReport {
            termination: Termination::TimedOut,
            handled,
            released,
        })
    }

    /// Waits for the pump to confirm it stopped, aborting it after the grace period.
    async fn await_shutdown(
        &self,
        pump: &mut JoinHandle<Result<(), BackendError>>,
    ) -> Result<(), BackendError> {
        match timeout(self.cancel_grace, &mut *pump).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Message source did not stop within {:?} of cancellation, aborting it",
                    self.cancel_grace
                );
                pump.abort();
                Ok(())
            }
        }
    }
}

async fn handle(handler: &impl MessageHandler, delivery: Delivery) {
    let id = delivery.message().id.clone();
    if let Err(e) = handler.handle(delivery).await {
        warn!("Failed to handle message {id:?}: {e}");
    }
}

async fn release_pending(rx: &mut Receiver<Delivery>) -> usize {
    let mut released = 0;
    while let Ok(delivery) = rx.try_recv() {
        if let Err(e) = delivery.nack().await {
            warn!("Failed to release message: {e}");
        }
        released += 1;
    }
    released
}
