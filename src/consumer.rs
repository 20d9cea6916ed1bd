//! NATS subscription for incoming assessment requests

use crate::service::RequestKind;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Receives every request published under `<prefix>.>`
pub struct RequestConsumer {
    client: Client,
    prefix: String,
}

impl RequestConsumer {
    pub fn new(client: Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    /// Subscribe to all request subjects
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subject = self.wildcard_subject();
        let subscriber = self.client.subscribe(subject.clone()).await?;
        info!(subject = %subject, "Subscribed to request subjects");
        Ok(subscriber)
    }

    pub fn wildcard_subject(&self) -> String {
        format!("{}.>", self.prefix)
    }

    /// Operation addressed by a received subject, if any
    pub fn kind_of(&self, subject: &str) -> Option<RequestKind> {
        RequestKind::from_subject(&self.prefix, subject)
    }
}
