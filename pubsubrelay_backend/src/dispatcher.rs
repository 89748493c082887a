//! Delivery of alert text to a Microsoft Teams incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use reqwest::Url;
use serde::Serialize;

use crate::{config::RelayConfig, error::DeliveryError};

/// Something alerts can be sent to.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Connector card payload. Teams renders `text` as the message body.
#[derive(Debug, Serialize)]
struct ConnectorCard<'a> {
    text: &'a str,
}

pub struct TeamsWebhook {
    webhook_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl TeamsWebhook {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.webhook_url.clone()).with_timeout(config.webhook_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> Result<Url, DeliveryError> {
        let url = self.webhook_url.trim();
        if url.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }

        Url::parse(url).map_err(|e| DeliveryError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AlertSink for TeamsWebhook {
    async fn send_alert(&self, text: &str) -> Result<(), DeliveryError> {
        let endpoint = self.endpoint()?;

        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(&ConnectorCard { text })
            .send()
            .await
            .map_err(|e| {
                error!("HTTP request to Teams webhook failed: {e}");
                DeliveryError::Http(e)
            })?;

        let status = response.status();
        if status.is_success() {
            info!("Sent alert to Teams webhook");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("Teams webhook rejected alert: status {status}, body: {body}");
        Err(DeliveryError::Rejected { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn empty_url_fails_without_request() {
        for url in ["", "   "] {
            let webhook = TeamsWebhook::new(url);

            assert!(matches!(webhook.endpoint(), Err(DeliveryError::NotConfigured)));
            assert!(matches!(
                webhook.send_alert("critical: CVE-1234").await,
                Err(DeliveryError::NotConfigured)
            ));
        }
    }

    #[tokio::test]
    async fn unparseable_url_is_rejected() {
        let result = TeamsWebhook::new("not a url")
            .send_alert("critical: CVE-1234")
            .await;

        assert!(matches!(result, Err(DeliveryError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn sends_exactly_one_request_with_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_json(json!({ "text": "critical: CVE-1234" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("1"))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = TeamsWebhook::new(format!("{}/webhook", server.uri()));

        webhook
            .send_alert("critical: CVE-1234")
            .await
            .expect("alert should be delivered");

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert!(String::from_utf8_lossy(&requests[0].body).contains("critical: CVE-1234"));
    }

    #[tokio::test]
    async fn server_error_is_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad payload"))
            .mount(&server)
            .await;

        let result = TeamsWebhook::new(server.uri()).send_alert("hello").await;

        match result {
            Err(DeliveryError::Rejected { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
                assert_eq!(body, "Bad payload");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let webhook = TeamsWebhook::new(server.uri()).with_timeout(Duration::from_millis(200));

        match webhook.send_alert("hello").await {
            Err(DeliveryError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
