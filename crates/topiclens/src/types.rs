//! Externally visible projections of cluster state.
//!
//! Every type here is built on demand from live broker metadata and dropped at
//! the end of the call that produced it. Field names serialize in camelCase,
//! which is the shape the HTTP facade and its clients agree on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Partition id meaning "no specific partition"; skips partition existence checks.
pub const PARTITION_UNASSIGNED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub id: i32,
    pub host: String,
    pub port: i32,
}

impl BrokerInfo {
    /// Placeholder used when the cluster does not report a broker.
    pub fn unknown() -> Self {
        Self {
            id: -1,
            host: String::new(),
            port: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub id: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInfo {
    pub name: String,
    pub num_partitions: i32,
    /// Replica count of the first partition; a representative sample, not a stored topic property.
    pub replication_factor: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub partitions: Vec<PartitionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerGroupInfo {
    pub group_id: String,
    /// Empty when the listing call does not report per-group state.
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartitionAssignment {
    pub topic: String,
    pub partition: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerGroupMemberInfo {
    pub client_id: String,
    pub consumer_id: String,
    pub host: String,
    #[serde(default)]
    pub assignments: Vec<TopicPartitionAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerGroupDetails {
    pub group_id: String,
    pub state: String,
    pub coordinator: BrokerInfo,
    #[serde(default)]
    pub members: Vec<ConsumerGroupMemberInfo>,
    /// Distinct topics across all member assignments, sorted.
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// RFC 3339, or `None` when the record carries no timestamp.
    pub timestamp: Option<String>,
    pub key: String,
    pub value: String,
    pub headers: BTreeMap<String, String>,
}

/// Low/high watermark pair of one partition. `high` is the next offset to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    pub low: i64,
    pub high: i64,
}

impl PartitionOffsets {
    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

/// Request to create a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    pub name: String,
    pub num_partitions: i32,
    pub replication_factor: i32,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Where a window read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetSpec {
    /// Oldest retrievable message of the partition.
    #[default]
    Earliest,
    /// The most recent messages, bounded by the latest-window cap.
    Latest,
    At(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOffsetError {
    pub input: String,
}

impl fmt::Display for ParseOffsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset must be a non-negative integer, 'earliest' or 'latest' (got '{}')",
            self.input
        )
    }
}

impl std::error::Error for ParseOffsetError {}

impl FromStr for OffsetSpec {
    type Err = ParseOffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "latest" => Ok(OffsetSpec::Latest),
            "earliest" => Ok(OffsetSpec::Earliest),
            other => match other.parse::<i64>() {
                Ok(offset) if offset >= 0 => Ok(OffsetSpec::At(offset)),
                _ => Err(ParseOffsetError {
                    input: s.to_string(),
                }),
            },
        }
    }
}

impl fmt::Display for OffsetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetSpec::Earliest => write!(f, "earliest"),
            OffsetSpec::Latest => write!(f, "latest"),
            OffsetSpec::At(offset) => write!(f, "{offset}"),
        }
    }
}

/// A single record to publish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingRecord {
    pub topic: String,
    /// `None` lets the producer's partitioner choose.
    pub partition: Option<i32>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub headers: BTreeMap<String, String>,
}

/// Acknowledged position of a published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub partition: i32,
    pub offset: i64,
}
