use pubsubrelay_backend::{
    BackendError, ListenReport, Listener, MessageSource, NeverAlert, PubsubSource, RelayConfig,
    RelayHandler, TeamsWebhook,
};

/// One listen cycle: connect, relay for the configured window, stop.
pub struct App {
    config: RelayConfig,
}

impl App {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<ListenReport, BackendError> {
        let source = PubsubSource::connect(&self.config).await?;
        self.run_with(source).await
    }

    pub async fn run_with(&self, source: impl MessageSource) -> Result<ListenReport, BackendError> {
        let listener = Listener::new(source, &self.config);
        // No alerting rule is defined yet, so messages are logged and acked only.
        let handler = RelayHandler::new(NeverAlert, TeamsWebhook::from_config(&self.config));

        listener.listen(&handler, self.config.pull_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pubsubrelay_backend::{model::SubscriptionRef, Delivery, Termination};
    use std::time::Duration;
    use tokio::sync::mpsc::Sender;
    use tokio_util::sync::CancellationToken;

    struct QuietSource;

    #[async_trait]
    impl MessageSource for QuietSource {
        fn describe(&self) -> String {
            "quiet".to_string()
        }

        async fn run(
            &self,
            _tx: Sender<Delivery>,
            cancel: CancellationToken,
        ) -> Result<(), BackendError> {
            cancel.cancelled().await;
            Ok(())
        }
    }

    fn config() -> RelayConfig {
        RelayConfig {
            subscription: SubscriptionRef::new("falco-prod", "falco-alerts-sub"),
            webhook_url: "https://example.webhook.office.com/hook".to_string(),
            pull_timeout: Duration::from_millis(100),
            cancel_grace: Duration::from_secs(1),
            channel_capacity: 10,
            webhook_timeout: Duration::from_secs(1),
            emulator_project_id: None,
        }
    }

    #[tokio::test]
    async fn quiet_cycle_ends_by_timeout() {
        let report = App::new(config()).run_with(QuietSource).await.unwrap();

        assert_eq!(report.termination, Termination::TimedOut);
        assert_eq!(report.handled, 0);
    }
}
