//! Broker client seam.
//!
//! [`ClusterClient`] is the long-lived, shared administrative handle. Read and
//! write sessions are opened per call, owned by the caller, and released when
//! dropped.

use crate::error::ClientError;
use crate::types::{BrokerInfo, DeliveryReport, OutgoingRecord, PartitionInfo, PartitionOffsets, TopicSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

pub mod assignment;
pub mod coordinator;
pub mod kafka;
pub mod memory;

pub use kafka::KafkaClusterClient;
pub use memory::InMemoryCluster;

/// Snapshot of cluster metadata as reported by one broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterMetadata {
    pub brokers: Vec<BrokerInfo>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<PartitionInfo>,
    /// Per-topic error, e.g. unknown topic on a targeted lookup.
    pub error: Option<ClientError>,
}

impl TopicMetadata {
    pub fn has_partition(&self, partition: i32) -> bool {
        self.partitions.iter().any(|p| p.id == partition)
    }
}

impl ClusterMetadata {
    pub fn topic(&self, name: &str) -> Option<&TopicMetadata> {
        self.topics.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub name: String,
    pub value: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupListing {
    pub group_id: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub member_id: String,
    pub client_id: String,
    pub host: String,
    pub assignment: Vec<crate::types::TopicPartitionAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescription {
    pub group_id: String,
    pub state: String,
    pub coordinator: BrokerInfo,
    pub members: Vec<GroupMember>,
}

/// Undecoded record as delivered by a read session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp_ms: Option<i64>,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub headers: Vec<(String, Option<Vec<u8>>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Record(RawRecord),
    /// Nothing arrived within the poll timeout.
    Empty,
    Error(ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    Beginning,
    Offset(i64),
}

/// Parameters for a session scoped to exactly one topic-partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSessionRequest {
    pub topic: String,
    pub partition: i32,
    pub start: StartOffset,
    /// Globally unique per session so concurrent reads never coordinate with each other.
    pub session_id: String,
}

#[async_trait]
pub trait ReadSession: Send {
    async fn poll(&mut self, timeout: Duration) -> PollEvent;
}

#[async_trait]
pub trait WriteSession: Send + Sync {
    /// Sends one record and waits for its delivery acknowledgment.
    async fn send(
        &self,
        record: &OutgoingRecord,
        timeout: Duration,
    ) -> Result<DeliveryReport, ClientError>;
}

/// Administrative and session-factory operations against a broker cluster.
///
/// Implementations must be safe to share across concurrently running calls.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetches metadata for one topic, or for the whole cluster when `topic` is `None`.
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<ClusterMetadata, ClientError>;

    /// Every configuration entry of a topic, default-valued ones included.
    async fn describe_topic_config(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> Result<Vec<ConfigEntry>, ClientError>;

    async fn create_topic(&self, spec: &TopicSpec, timeout: Duration) -> Result<(), ClientError>;

    async fn delete_topic(&self, topic: &str, timeout: Duration) -> Result<(), ClientError>;

    /// Applies all entries as one alteration; either every entry lands or none does.
    async fn alter_topic_config(
        &self,
        topic: &str,
        config: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(), ClientError>;

    async fn list_groups(&self, timeout: Duration) -> Result<Vec<GroupListing>, ClientError>;

    async fn describe_group(
        &self,
        group_id: &str,
        timeout: Duration,
    ) -> Result<GroupDescription, ClientError>;

    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: i32,
        timeout: Duration,
    ) -> Result<PartitionOffsets, ClientError>;

    async fn open_read_session(
        &self,
        request: &ReadSessionRequest,
    ) -> Result<Box<dyn ReadSession>, ClientError>;

    async fn open_write_session(&self) -> Result<Box<dyn WriteSession>, ClientError>;
}
