//! Group coordinator lookup.
//!
//! A group is coordinated by the leader of the offsets-topic partition its id
//! hashes to. The hash is the JVM `String.hashCode` over UTF-16 code units with
//! the sign bit masked off, matching the broker's own placement.

use super::ClusterMetadata;
use crate::types::BrokerInfo;

pub const OFFSETS_TOPIC: &str = "__consumer_offsets";

fn jvm_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Offsets-topic partition that owns `group_id`.
pub fn coordinator_partition(group_id: &str, partition_count: usize) -> Option<i32> {
    if partition_count == 0 {
        return None;
    }
    let hash = (jvm_string_hash(group_id) & 0x7fff_ffff) as usize;
    i32::try_from(hash % partition_count).ok()
}

/// Resolves the coordinating broker from metadata that includes the offsets topic.
pub fn resolve_coordinator(group_id: &str, metadata: &ClusterMetadata) -> Option<BrokerInfo> {
    let offsets_topic = metadata.topic(OFFSETS_TOPIC)?;
    let partition = coordinator_partition(group_id, offsets_topic.partitions.len())?;
    let leader = offsets_topic
        .partitions
        .iter()
        .find(|p| p.id == partition)?
        .leader;
    metadata.brokers.iter().find(|b| b.id == leader).cloned()
}
