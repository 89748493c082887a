mod pubsub_message;
pub use pubsub_message::PubsubMessage;

use std::fmt;

/// Identifies the subscription the relay listens on.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionRef {
    pub project_id: String,
    pub subscription_id: String,
}

impl SubscriptionRef {
    pub fn new(project_id: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            subscription_id: subscription_id.into(),
        }
    }

    /// The fully-qualified subscription name, e.g. `projects/p/subscriptions/s`.
    pub fn path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.project_id, self.subscription_id
        )
    }
}

impl fmt::Display for SubscriptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
