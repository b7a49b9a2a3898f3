use crate::cancel::CancelSignal;
use crate::connection::Connection;
use crate::error::{ClientError, ClientErrorKind, LensError};
use crate::types::{DeliveryReport, OutgoingRecord};
use log::{debug, warn};

/// Single-record write path. Each publish uses its own write session.
#[derive(Clone)]
pub struct Publisher {
    connection: Connection,
}

impl Publisher {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Sends one record and waits for its acknowledgment or for cancellation,
    /// whichever comes first. A negative partition lets the partitioner choose.
    #[tracing::instrument(level = "debug", skip(self, record, cancel), fields(topic = %record.topic))]
    pub async fn publish(
        &self,
        mut record: OutgoingRecord,
        cancel: &CancelSignal,
    ) -> Result<DeliveryReport, LensError> {
        if record.topic.trim().is_empty() {
            return Err(LensError::validation("topic", "topic name is required"));
        }
        record.partition = record.partition.filter(|p| *p >= 0);

        let topic = self
            .connection
            .require_topic(&record.topic, "get topic metadata")
            .await?;
        if let Some(partition) = record.partition {
            if !topic.has_partition(partition) {
                return Err(LensError::PartitionNotFound {
                    topic: record.topic.clone(),
                    partition,
                });
            }
        }

        let session = self
            .connection
            .client()
            .open_write_session()
            .await
            .map_err(|e| LensError::upstream("create write session", e))?;

        let timeout = self.connection.timeout();
        let delivery = tokio::time::timeout(timeout, session.send(&record, timeout));
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Publish to {} cancelled before acknowledgment", record.topic);
                return Err(LensError::Cancelled {
                    context: "message delivery".to_string(),
                });
            }
            result = delivery => match result {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => return Err(LensError::upstream("produce message", e)),
                Err(_) => {
                    return Err(LensError::upstream(
                        "produce message",
                        ClientError::new(
                            ClientErrorKind::TimedOut,
                            format!("no acknowledgment within {timeout:?}"),
                        ),
                    ));
                }
            },
        };

        debug!(
            "Published to {} partition {} at offset {}",
            record.topic, report.partition, report.offset
        );
        Ok(report)
    }
}
