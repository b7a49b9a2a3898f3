use crate::client::{ClusterClient, KafkaClusterClient, TopicMetadata};
use crate::error::{ClientErrorKind, LensError};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Shared broker handle plus the base timeout every call derives its deadlines from.
///
/// Cheap to clone; all clones use the same underlying client.
#[derive(Clone)]
pub struct Connection {
    client: Arc<dyn ClusterClient>,
    timeout: Duration,
}

impl Connection {
    /// Connects to a Kafka cluster. An empty broker list is rejected.
    pub fn connect(brokers: Vec<String>, timeout: Duration) -> Result<Self, LensError> {
        if brokers.is_empty() {
            return Err(LensError::validation(
                "brokers",
                "no Kafka brokers provided",
            ));
        }
        let client = KafkaClusterClient::connect(&brokers)
            .map_err(|e| LensError::upstream("create Kafka client", e))?;
        info!("Connected to Kafka brokers {}", brokers.join(","));
        Ok(Self {
            client: Arc::new(client),
            timeout,
        })
    }

    pub fn with_client(client: Arc<dyn ClusterClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
        }
    }

    pub fn client(&self) -> &dyn ClusterClient {
        self.client.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches metadata of one topic, failing with `TopicNotFound` when the
    /// cluster does not know it.
    pub async fn require_topic(&self, topic: &str, context: &str) -> Result<TopicMetadata, LensError> {
        let not_found = || LensError::TopicNotFound {
            topic: topic.to_string(),
        };

        let metadata = match self.client.fetch_metadata(Some(topic), self.timeout).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind == ClientErrorKind::UnknownTopicOrPartition => return Err(not_found()),
            Err(e) => return Err(LensError::upstream(context, e)),
        };

        let found = metadata
            .topics
            .into_iter()
            .find(|t| t.name == topic)
            .ok_or_else(not_found)?;
        match &found.error {
            None => Ok(found),
            Some(e) if e.kind == ClientErrorKind::UnknownTopicOrPartition => Err(not_found()),
            Some(e) => Err(LensError::upstream(context, e.clone())),
        }
    }
}
