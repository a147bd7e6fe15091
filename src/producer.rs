//! NATS message producer for verdicts

use crate::types::verdict::Verdict;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing verdicts to NATS
#[derive(Clone)]
pub struct VerdictProducer {
    client: Client,
    subject: String,
}

impl VerdictProducer {
    /// Create a new verdict producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a verdict to the configured subject
    pub async fn publish(&self, verdict: &Verdict) -> Result<()> {
        let payload = serde_json::to_vec(verdict)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            verdict_id = %verdict.verdict_id,
            record_id = %verdict.record_id,
            predicted_label = %verdict.predicted_label,
            "Published verdict"
        );

        Ok(())
    }

    /// Reply directly to a request's reply subject
    pub async fn reply(&self, reply_subject: String, verdict: &Verdict) -> Result<()> {
        let payload = serde_json::to_vec(verdict)?;
        self.client.publish(reply_subject, payload.into()).await?;
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
