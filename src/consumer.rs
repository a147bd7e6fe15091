//! NATS message consumer for incoming risk records

use crate::error::Result as PipelineResult;
use crate::types::record::RiskRecord;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving risk records from NATS.
///
/// Owns the wire format on the inbound side: subscribing to the record
/// subject and decoding payloads into [`RiskRecord`]s.
pub struct RecordConsumer {
    client: Client,
    subject: String,
}

impl RecordConsumer {
    /// Create a new record consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the record subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to record subject");
        Ok(subscriber)
    }

    /// Decode a raw message payload into a risk record.
    pub fn decode(payload: &[u8]) -> PipelineResult<RiskRecord> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
