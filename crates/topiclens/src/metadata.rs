//! Read-only projections of cluster metadata.

use crate::client::{GroupDescription, TopicMetadata};
use crate::connection::Connection;
use crate::error::{ClientErrorKind, LensError};
use crate::types::{
    BrokerInfo, ConsumerGroupDetails, ConsumerGroupInfo, ConsumerGroupMemberInfo, TopicInfo,
};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Projects a topic's metadata. Partitions come out ordered by id and the
/// replication factor is sampled from the first one.
pub fn project_topic(metadata: TopicMetadata) -> TopicInfo {
    let mut partitions = metadata.partitions;
    partitions.sort_by_key(|p| p.id);
    let replication_factor = partitions
        .first()
        .map(|p| p.replicas.len() as i32)
        .unwrap_or(0);
    TopicInfo {
        name: metadata.name,
        num_partitions: partitions.len() as i32,
        replication_factor,
        config: BTreeMap::new(),
        partitions,
    }
}

fn project_group(description: GroupDescription) -> ConsumerGroupDetails {
    let topics: BTreeSet<String> = description
        .members
        .iter()
        .flat_map(|m| m.assignment.iter().map(|a| a.topic.clone()))
        .collect();

    let members = description
        .members
        .into_iter()
        .map(|m| ConsumerGroupMemberInfo {
            client_id: m.client_id,
            consumer_id: m.member_id,
            host: m.host,
            assignments: m.assignment,
        })
        .collect();

    ConsumerGroupDetails {
        group_id: description.group_id,
        state: description.state,
        coordinator: description.coordinator,
        members,
        topics: topics.into_iter().collect(),
    }
}

#[derive(Clone)]
pub struct MetadataAggregator {
    connection: Connection,
}

impl MetadataAggregator {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// All brokers, ordered by id.
    pub async fn get_brokers(&self) -> Result<Vec<BrokerInfo>, LensError> {
        let metadata = self
            .connection
            .client()
            .fetch_metadata(None, self.connection.timeout())
            .await
            .map_err(|e| LensError::upstream("get cluster metadata", e))?;
        let mut brokers = metadata.brokers;
        brokers.sort_by_key(|b| b.id);
        Ok(brokers)
    }

    /// All topics sorted by name, without configuration.
    pub async fn list_topics(&self) -> Result<Vec<TopicInfo>, LensError> {
        let metadata = self
            .connection
            .client()
            .fetch_metadata(None, self.connection.timeout())
            .await
            .map_err(|e| LensError::upstream("list topics", e))?;

        let mut topics: Vec<TopicInfo> = metadata
            .topics
            .into_iter()
            .filter(|t| match &t.error {
                Some(e) if e.kind == ClientErrorKind::UnknownTopicOrPartition => {
                    debug!("Skipping topic {} that vanished during listing", t.name);
                    false
                }
                _ => true,
            })
            .map(project_topic)
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    /// One topic with its explicitly overridden configuration.
    pub async fn get_topic_details(&self, name: &str) -> Result<TopicInfo, LensError> {
        if name.trim().is_empty() {
            return Err(LensError::validation("topic", "topic name is required"));
        }
        let metadata = self
            .connection
            .require_topic(name, "get topic metadata")
            .await?;

        let entries = self
            .connection
            .client()
            .describe_topic_config(name, self.connection.timeout())
            .await
            .map_err(|e| match e.kind {
                ClientErrorKind::UnknownTopicOrPartition => LensError::TopicNotFound {
                    topic: name.to_string(),
                },
                _ => LensError::upstream("describe topic config", e),
            })?;

        let mut topic = project_topic(metadata);
        topic.config = entries
            .into_iter()
            .filter(|e| !e.is_default)
            .filter_map(|e| e.value.map(|v| (e.name, v)))
            .collect();
        Ok(topic)
    }

    /// All consumer groups sorted by id.
    pub async fn list_consumer_groups(&self) -> Result<Vec<ConsumerGroupInfo>, LensError> {
        let listings = self
            .connection
            .client()
            .list_groups(self.connection.timeout())
            .await
            .map_err(|e| LensError::upstream("list consumer groups", e))?;

        let mut groups: Vec<ConsumerGroupInfo> = listings
            .into_iter()
            .map(|g| ConsumerGroupInfo {
                group_id: g.group_id,
                state: g.state.unwrap_or_default(),
            })
            .collect();
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(groups)
    }

    pub async fn get_consumer_group_details(
        &self,
        group_id: &str,
    ) -> Result<ConsumerGroupDetails, LensError> {
        if group_id.trim().is_empty() {
            return Err(LensError::GroupNotFound {
                group_id: group_id.to_string(),
                detail: Some("group id is empty".to_string()),
            });
        }

        let description = self
            .connection
            .client()
            .describe_group(group_id, self.connection.timeout())
            .await
            .map_err(|e| match e.kind {
                ClientErrorKind::GroupNotFound => LensError::GroupNotFound {
                    group_id: group_id.to_string(),
                    detail: Some(e.message),
                },
                _ => LensError::upstream(&format!("describe consumer group '{group_id}'"), e),
            })?;

        Ok(project_group(description))
    }
}
