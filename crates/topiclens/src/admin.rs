//! Topic mutations: validate locally, pre-check existence, then delegate.

use crate::connection::Connection;
use crate::error::{ClientErrorKind, LensError};
use crate::types::TopicSpec;
use log::info;
use std::collections::BTreeMap;

fn require_name(name: &str) -> Result<(), LensError> {
    if name.trim().is_empty() {
        return Err(LensError::validation("name", "topic name is required"));
    }
    Ok(())
}

/// Checks a creation request without touching the cluster.
pub fn validate_topic_spec(spec: &TopicSpec) -> Result<(), LensError> {
    require_name(&spec.name)?;
    if spec.num_partitions < 1 {
        return Err(LensError::validation(
            "numPartitions",
            "number of partitions must be at least 1",
        ));
    }
    if spec.replication_factor < 1 {
        return Err(LensError::validation(
            "replicationFactor",
            "replication factor must be at least 1",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TopicAdmin {
    connection: Connection,
}

impl TopicAdmin {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn create_topic(&self, spec: &TopicSpec) -> Result<(), LensError> {
        validate_topic_spec(spec)?;

        self.connection
            .client()
            .create_topic(spec, self.connection.timeout())
            .await
            .map_err(|e| match e.kind {
                ClientErrorKind::TopicAlreadyExists => LensError::TopicAlreadyExists {
                    topic: spec.name.clone(),
                    detail: e.message,
                },
                _ => LensError::upstream("create topic", e),
            })?;

        info!(
            "Created topic {} with {} partitions, replication factor {}",
            spec.name, spec.num_partitions, spec.replication_factor
        );
        Ok(())
    }

    pub async fn delete_topic(&self, name: &str) -> Result<(), LensError> {
        require_name(name)?;
        self.connection.require_topic(name, "check topic existence").await?;

        self.connection
            .client()
            .delete_topic(name, self.connection.timeout())
            .await
            .map_err(|e| match e.kind {
                ClientErrorKind::UnknownTopicOrPartition => LensError::TopicNotFound {
                    topic: name.to_string(),
                },
                _ => LensError::upstream("delete topic", e),
            })?;

        info!("Deleted topic {name}");
        Ok(())
    }

    /// Applies every entry as one alteration; a rejected entry fails the whole call.
    pub async fn update_topic_config(
        &self,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<(), LensError> {
        require_name(name)?;
        if config.is_empty() {
            return Err(LensError::validation(
                "config",
                "at least one configuration entry is required",
            ));
        }
        self.connection.require_topic(name, "check topic existence").await?;

        self.connection
            .client()
            .alter_topic_config(name, config, self.connection.timeout())
            .await
            .map_err(|e| match e.kind {
                ClientErrorKind::UnknownTopicOrPartition => LensError::TopicNotFound {
                    topic: name.to_string(),
                },
                _ => LensError::upstream("update topic config", e),
            })?;

        info!("Updated {} config entries of topic {name}", config.len());
        Ok(())
    }
}
