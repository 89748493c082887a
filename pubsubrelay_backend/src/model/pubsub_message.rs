use chrono::{DateTime, TimeZone, Utc};
use google_cloud_googleapis::pubsub::v1::PubsubMessage as WireMessage;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PubsubMessage {
    pub id: String,
    pub publish_time: Option<DateTime<Utc>>,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl PubsubMessage {
    pub fn new(data: impl Into<Vec<u8>>, attributes: HashMap<String, String>) -> Self {
        Self {
            data: data.into(),
            attributes,
            ..Default::default()
        }
    }

    /// The payload as text. Invalid UTF-8 sequences are replaced.
    pub fn data_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// The payload parsed as JSON, falling back to a JSON string of the text.
    pub fn data_json(&self) -> Value {
        match serde_json::from_slice(&self.data) {
            Ok(val) => val,
            Err(_) => Value::String(self.data_text()),
        }
    }
}

impl From<WireMessage> for PubsubMessage {
    fn from(value: WireMessage) -> Self {
        let publish_time = value
            .publish_time
            .map(|t| Utc.timestamp_opt(t.seconds, t.nanos.try_into().unwrap_or(0)))
            .and_then(|lr| match lr {
                chrono::LocalResult::Single(dt) => Some(dt),
                _ => None,
            });

        Self {
            id: value.message_id,
            publish_time,
            data: value.data.into(),
            attributes: value.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_wire_message() {
        let mut wire = WireMessage {
            data: br#"{"priority":"Critical","rule":"Terminal shell in container"}"#
                .to_vec()
                .into(),
            attributes: HashMap::from([("source".to_string(), "falco".to_string())]),
            message_id: "4711".to_string(),
            publish_time: Some(Default::default()),
            ..Default::default()
        };
        if let Some(ts) = wire.publish_time.as_mut() {
            ts.seconds = 1_700_000_000;
            ts.nanos = 5;
        }

        let message = PubsubMessage::from(wire);

        assert_eq!(message.id, "4711");
        assert_eq!(message.attributes["source"], "falco");
        assert_eq!(
            message.publish_time.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(message.data_json()["priority"], "Critical");
    }

    #[test]
    fn non_json_payload_renders_as_string() {
        let message = PubsubMessage::new("plain text", HashMap::new());
        assert_eq!(message.data_json(), Value::String("plain text".to_string()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let message = PubsubMessage::new(vec![0x66, 0xff, 0x6f], HashMap::new());
        assert_eq!(message.data_text(), "f\u{fffd}o");
    }

    #[test]
    fn missing_publish_time_stays_none() {
        let message = PubsubMessage::from(WireMessage::default());
        assert!(message.publish_time.is_none());
        assert!(message.attributes.is_empty());
    }
}
