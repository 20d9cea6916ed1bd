//! NATS publisher for replies and dashboard snapshots

use crate::types::snapshot::RealTimeSnapshot;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Sends request replies and periodic snapshots
#[derive(Clone)]
pub struct ResponsePublisher {
    client: Client,
    snapshot_subject: String,
}

impl ResponsePublisher {
    pub fn new(client: Client, prefix: &str) -> Self {
        Self {
            client,
            snapshot_subject: snapshot_subject(prefix),
        }
    }

    /// Answer a request on its reply inbox
    pub async fn reply(&self, reply_to: Subject, payload: Vec<u8>) -> Result<()> {
        let size = payload.len();
        self.client.publish(reply_to.clone(), payload.into()).await?;
        debug!(reply_to = %reply_to, bytes = size, "Reply sent");
        Ok(())
    }

    /// Publish the dashboard snapshot to `<prefix>.snapshot`
    pub async fn publish_snapshot(&self, snapshot: &RealTimeSnapshot) -> Result<()> {
        let payload = serde_json::to_vec(snapshot)?;

        self.client
            .publish(self.snapshot_subject.clone(), payload.into())
            .await?;

        debug!(
            subject = %self.snapshot_subject,
            total_predictions = snapshot.system_stats.total_predictions,
            "Published snapshot"
        );
        Ok(())
    }

    pub fn snapshot_subject(&self) -> &str {
        &self.snapshot_subject
    }
}

fn snapshot_subject(prefix: &str) -> String {
    format!("{prefix}.snapshot")
}
