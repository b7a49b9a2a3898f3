//! In-process [`ClusterClient`] for tests and local development.
//!
//! Holds brokers, topics with per-partition logs, topic configs and consumer
//! groups behind one lock. Failures and poll sequences can be scripted per
//! operation so callers can exercise error paths without a broker.

use super::{
    ClusterClient, ClusterMetadata, ConfigEntry, GroupDescription, GroupListing, PollEvent,
    RawRecord, ReadSession, ReadSessionRequest, StartOffset, TopicMetadata, WriteSession,
};
use crate::error::{ClientError, ClientErrorKind};
use crate::types::{
    BrokerInfo, DeliveryReport, OutgoingRecord, PartitionInfo, PartitionOffsets, TopicSpec,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Broker defaults reported for every topic unless overridden.
const DEFAULT_TOPIC_CONFIG: &[(&str, &str)] = &[
    ("cleanup.policy", "delete"),
    ("compression.type", "producer"),
    ("max.message.bytes", "1048588"),
    ("min.insync.replicas", "1"),
    ("retention.bytes", "-1"),
    ("retention.ms", "604800000"),
    ("segment.bytes", "1073741824"),
];

/// Client operation a fault can be scripted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Metadata,
    DescribeConfig,
    CreateTopic,
    DeleteTopic,
    AlterConfig,
    ListGroups,
    DescribeGroup,
    Watermarks,
    OpenReadSession,
    OpenWriteSession,
    Send,
}

struct MemoryPartition {
    info: PartitionInfo,
    log_start: i64,
    next_offset: i64,
    records: Vec<RawRecord>,
}

struct MemoryTopic {
    partitions: Vec<MemoryPartition>,
    overrides: BTreeMap<String, String>,
}

#[derive(Default)]
struct ClusterState {
    brokers: Vec<BrokerInfo>,
    topics: BTreeMap<String, MemoryTopic>,
    groups: BTreeMap<String, GroupDescription>,
    faults: HashMap<Operation, VecDeque<ClientError>>,
    poll_script: VecDeque<PollEvent>,
    delivery_delay: Option<Duration>,
    metadata_delay: Option<Duration>,
    read_requests: Vec<ReadSessionRequest>,
    active_read_sessions: usize,
}

fn unknown_topic(topic: &str) -> ClientError {
    ClientError::new(
        ClientErrorKind::UnknownTopicOrPartition,
        format!("Broker: Unknown topic or partition ({topic})"),
    )
}

fn is_known_config(key: &str) -> bool {
    DEFAULT_TOPIC_CONFIG.iter().any(|(name, _)| *name == key)
}

impl ClusterState {
    fn take_fault(&mut self, operation: Operation) -> Result<(), ClientError> {
        match self.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn partition_mut(
        &mut self,
        topic: &str,
        partition: i32,
    ) -> Result<&mut MemoryPartition, ClientError> {
        self.topics
            .get_mut(topic)
            .and_then(|t| t.partitions.iter_mut().find(|p| p.info.id == partition))
            .ok_or_else(|| unknown_topic(topic))
    }

    fn build_partitions(&self, count: i32, replication_factor: i32) -> Vec<MemoryPartition> {
        let broker_ids: Vec<i32> = self.brokers.iter().map(|b| b.id).collect();
        (0..count)
            .map(|id| {
                let replicas: Vec<i32> = if broker_ids.is_empty() {
                    Vec::new()
                } else {
                    (0..replication_factor as usize)
                        .map(|r| broker_ids[(id as usize + r) % broker_ids.len()])
                        .collect()
                };
                MemoryPartition {
                    info: PartitionInfo {
                        id,
                        leader: replicas.first().copied().unwrap_or(-1),
                        isr: replicas.clone(),
                        replicas,
                    },
                    log_start: 0,
                    next_offset: 0,
                    records: Vec::new(),
                }
            })
            .collect()
    }

    fn append(&mut self, topic: &str, partition: i32, mut record: RawRecord) -> Result<i64, ClientError> {
        let target = self.partition_mut(topic, partition)?;
        let offset = target.next_offset;
        record.topic = topic.to_string();
        record.partition = partition;
        record.offset = offset;
        target.records.push(record);
        target.next_offset += 1;
        Ok(offset)
    }
}

/// Shared in-memory cluster. Clones observe and mutate the same state.
#[derive(Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<RwLock<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broker(self, id: i32, host: &str, port: i32) -> Self {
        self.state.write().brokers.push(BrokerInfo {
            id,
            host: host.to_string(),
            port,
        });
        self
    }

    /// Adds a topic replicated across every registered broker.
    pub fn with_topic(self, name: &str, partitions: i32) -> Self {
        {
            let mut state = self.state.write();
            let replication_factor = state.brokers.len().max(1) as i32;
            let partitions = state.build_partitions(partitions, replication_factor);
            state.topics.insert(
                name.to_string(),
                MemoryTopic {
                    partitions,
                    overrides: BTreeMap::new(),
                },
            );
        }
        self
    }

    pub fn with_topic_config(self, topic: &str, key: &str, value: &str) -> Self {
        if let Some(t) = self.state.write().topics.get_mut(topic) {
            t.overrides.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_group(self, group: GroupDescription) -> Self {
        self.state
            .write()
            .groups
            .insert(group.group_id.clone(), group);
        self
    }

    /// Appends a record and returns its offset.
    pub fn append(
        &self,
        topic: &str,
        partition: i32,
        key: Option<&str>,
        value: &str,
    ) -> Result<i64, ClientError> {
        self.append_record(
            topic,
            partition,
            RawRecord {
                key: key.map(|k| k.as_bytes().to_vec()),
                payload: Some(value.as_bytes().to_vec()),
                timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
                ..RawRecord::default()
            },
        )
    }

    /// Appends a fully specified record; topic, partition and offset are assigned here.
    pub fn append_record(
        &self,
        topic: &str,
        partition: i32,
        record: RawRecord,
    ) -> Result<i64, ClientError> {
        self.state.write().append(topic, partition, record)
    }

    /// Moves the log start forward as retention would, discarding older records.
    pub fn set_log_start(&self, topic: &str, partition: i32, offset: i64) -> Result<(), ClientError> {
        let mut state = self.state.write();
        let target = state.partition_mut(topic, partition)?;
        target.log_start = offset;
        target.next_offset = target.next_offset.max(offset);
        target.records.retain(|r| r.offset >= offset);
        Ok(())
    }

    /// Fails the next call of `operation` with `error`. Queued faults fire in order.
    pub fn fail_next(&self, operation: Operation, error: ClientError) {
        self.state
            .write()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Events the next read session returns before serving the log.
    pub fn script_polls(&self, events: impl IntoIterator<Item = PollEvent>) {
        self.state.write().poll_script.extend(events);
    }

    /// Delays every delivery acknowledgment.
    pub fn set_delivery_delay(&self, delay: Duration) {
        self.state.write().delivery_delay = Some(delay);
    }

    /// Slows every metadata round trip, as an overloaded controller would.
    pub fn set_metadata_delay(&self, delay: Duration) {
        self.state.write().metadata_delay = Some(delay);
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.state.read().topics.contains_key(topic)
    }

    pub fn topic_overrides(&self, topic: &str) -> Option<BTreeMap<String, String>> {
        self.state.read().topics.get(topic).map(|t| t.overrides.clone())
    }

    pub fn records(&self, topic: &str, partition: i32) -> Vec<RawRecord> {
        let state = self.state.read();
        state
            .topics
            .get(topic)
            .and_then(|t| t.partitions.iter().find(|p| p.info.id == partition))
            .map(|p| p.records.clone())
            .unwrap_or_default()
    }

    pub fn read_session_requests(&self) -> Vec<ReadSessionRequest> {
        self.state.read().read_requests.clone()
    }

    /// Read sessions opened and not yet dropped.
    pub fn active_read_sessions(&self) -> usize {
        self.state.read().active_read_sessions
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        _timeout: Duration,
    ) -> Result<ClusterMetadata, ClientError> {
        let delay = self.state.read().metadata_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write();
        state.take_fault(Operation::Metadata)?;

        let project = |name: &str, t: &MemoryTopic| TopicMetadata {
            name: name.to_string(),
            partitions: t.partitions.iter().map(|p| p.info.clone()).collect(),
            error: None,
        };
        let topics = match topic {
            Some(name) => match state.topics.get(name) {
                Some(t) => vec![project(name, t)],
                None => vec![TopicMetadata {
                    name: name.to_string(),
                    partitions: Vec::new(),
                    error: Some(unknown_topic(name)),
                }],
            },
            None => state
                .topics
                .iter()
                .map(|(name, t)| project(name, t))
                .collect(),
        };

        Ok(ClusterMetadata {
            brokers: state.brokers.clone(),
            topics,
        })
    }

    async fn describe_topic_config(
        &self,
        topic: &str,
        _timeout: Duration,
    ) -> Result<Vec<ConfigEntry>, ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::DescribeConfig)?;
        let t = state.topics.get(topic).ok_or_else(|| unknown_topic(topic))?;

        let mut entries: Vec<ConfigEntry> = DEFAULT_TOPIC_CONFIG
            .iter()
            .map(|(name, default)| match t.overrides.get(*name) {
                Some(value) => ConfigEntry {
                    name: name.to_string(),
                    value: Some(value.clone()),
                    is_default: false,
                },
                None => ConfigEntry {
                    name: name.to_string(),
                    value: Some(default.to_string()),
                    is_default: true,
                },
            })
            .collect();
        entries.extend(
            t.overrides
                .iter()
                .filter(|(name, _)| !is_known_config(name))
                .map(|(name, value)| ConfigEntry {
                    name: name.clone(),
                    value: Some(value.clone()),
                    is_default: false,
                }),
        );
        Ok(entries)
    }

    async fn create_topic(&self, spec: &TopicSpec, _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::CreateTopic)?;

        if state.topics.contains_key(&spec.name) {
            return Err(ClientError::new(
                ClientErrorKind::TopicAlreadyExists,
                format!("Broker: Topic already exists ({})", spec.name),
            ));
        }
        if spec.num_partitions < 1 || spec.replication_factor < 1 {
            return Err(ClientError::new(
                ClientErrorKind::InvalidRequest,
                "partitions and replication factor must be positive",
            ));
        }
        if spec.replication_factor as usize > state.brokers.len() {
            return Err(ClientError::new(
                ClientErrorKind::InvalidRequest,
                format!(
                    "Replication factor: {} larger than available brokers: {}",
                    spec.replication_factor,
                    state.brokers.len()
                ),
            ));
        }
        if let Some(key) = spec.config.keys().find(|k| !is_known_config(k)) {
            return Err(ClientError::new(
                ClientErrorKind::InvalidRequest,
                format!("Unknown topic config name: {key}"),
            ));
        }

        let partitions = state.build_partitions(spec.num_partitions, spec.replication_factor);
        state.topics.insert(
            spec.name.clone(),
            MemoryTopic {
                partitions,
                overrides: spec.config.clone(),
            },
        );
        Ok(())
    }

    async fn delete_topic(&self, topic: &str, _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::DeleteTopic)?;
        state
            .topics
            .remove(topic)
            .map(|_| ())
            .ok_or_else(|| unknown_topic(topic))
    }

    /// Replaces the topic's overrides wholesale, like the broker's non-incremental alter:
    /// keys not listed fall back to their defaults.
    async fn alter_topic_config(
        &self,
        topic: &str,
        config: &BTreeMap<String, String>,
        _timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::AlterConfig)?;
        if let Some(key) = config.keys().find(|k| !is_known_config(k)) {
            return Err(ClientError::new(
                ClientErrorKind::InvalidRequest,
                format!("Unknown topic config name: {key}"),
            ));
        }
        let t = state.topics.get_mut(topic).ok_or_else(|| unknown_topic(topic))?;
        t.overrides = config.clone();
        Ok(())
    }

    async fn list_groups(&self, _timeout: Duration) -> Result<Vec<GroupListing>, ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::ListGroups)?;
        Ok(state
            .groups
            .values()
            .map(|g| GroupListing {
                group_id: g.group_id.clone(),
                state: Some(g.state.clone()),
            })
            .collect())
    }

    async fn describe_group(
        &self,
        group_id: &str,
        _timeout: Duration,
    ) -> Result<GroupDescription, ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::DescribeGroup)?;
        state
            .groups
            .get(group_id)
            .filter(|g| g.state != "Dead")
            .cloned()
            .ok_or_else(|| {
                ClientError::new(
                    ClientErrorKind::GroupNotFound,
                    format!("group '{group_id}' is not known to the cluster"),
                )
            })
    }

    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: i32,
        _timeout: Duration,
    ) -> Result<PartitionOffsets, ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::Watermarks)?;
        let p = state.partition_mut(topic, partition)?;
        Ok(PartitionOffsets {
            low: p.log_start,
            high: p.next_offset,
        })
    }

    async fn open_read_session(
        &self,
        request: &ReadSessionRequest,
    ) -> Result<Box<dyn ReadSession>, ClientError> {
        let mut state = self.state.write();
        state.take_fault(Operation::OpenReadSession)?;
        let p = state.partition_mut(&request.topic, request.partition)?;
        // out-of-range starts reset to the log start, as auto.offset.reset=earliest does
        let cursor = match request.start {
            StartOffset::Offset(offset) if (p.log_start..=p.next_offset).contains(&offset) => {
                offset
            }
            _ => p.log_start,
        };

        let script = std::mem::take(&mut state.poll_script);
        state.read_requests.push(request.clone());
        state.active_read_sessions += 1;

        Ok(Box::new(MemoryReadSession {
            state: Arc::clone(&self.state),
            topic: request.topic.clone(),
            partition: request.partition,
            cursor,
            script,
        }))
    }

    async fn open_write_session(&self) -> Result<Box<dyn WriteSession>, ClientError> {
        self.state.write().take_fault(Operation::OpenWriteSession)?;
        Ok(Box::new(MemoryWriteSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryReadSession {
    state: Arc<RwLock<ClusterState>>,
    topic: String,
    partition: i32,
    cursor: i64,
    script: VecDeque<PollEvent>,
}

impl MemoryReadSession {
    fn next_record(&mut self) -> Option<Result<RawRecord, ClientError>> {
        let state = self.state.read();
        let partition = match state
            .topics
            .get(&self.topic)
            .and_then(|t| t.partitions.iter().find(|p| p.info.id == self.partition))
        {
            Some(p) => p,
            None => return Some(Err(unknown_topic(&self.topic))),
        };
        let record = partition
            .records
            .iter()
            .find(|r| r.offset >= self.cursor)
            .cloned()?;
        self.cursor = record.offset + 1;
        Some(Ok(record))
    }
}

#[async_trait]
impl ReadSession for MemoryReadSession {
    async fn poll(&mut self, timeout: Duration) -> PollEvent {
        let event = match self.script.pop_front() {
            Some(event) => Some(event),
            None => self.next_record().map(|r| match r {
                Ok(record) => PollEvent::Record(record),
                Err(error) => PollEvent::Error(error),
            }),
        };
        match event {
            Some(PollEvent::Empty) | None => {
                tokio::time::sleep(timeout).await;
                PollEvent::Empty
            }
            Some(event) => event,
        }
    }
}

impl Drop for MemoryReadSession {
    fn drop(&mut self) {
        let mut state = self.state.write();
        state.active_read_sessions = state.active_read_sessions.saturating_sub(1);
    }
}

struct MemoryWriteSession {
    state: Arc<RwLock<ClusterState>>,
}

fn key_partition(key: &str, partitions: usize) -> i32 {
    let sum = key.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize));
    (sum % partitions.max(1)) as i32
}

#[async_trait]
impl WriteSession for MemoryWriteSession {
    async fn send(
        &self,
        record: &OutgoingRecord,
        _timeout: Duration,
    ) -> Result<DeliveryReport, ClientError> {
        let delay = {
            let mut state = self.state.write();
            state.take_fault(Operation::Send)?;
            state.delivery_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write();
        let partition = match record.partition {
            Some(partition) => partition,
            None => {
                let count = state
                    .topics
                    .get(&record.topic)
                    .map(|t| t.partitions.len())
                    .ok_or_else(|| unknown_topic(&record.topic))?;
                record
                    .key
                    .as_deref()
                    .map(|key| key_partition(key, count))
                    .unwrap_or(0)
            }
        };
        let raw = RawRecord {
            timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
            key: record.key.as_ref().map(|k| k.as_bytes().to_vec()),
            payload: record.value.as_ref().map(|v| v.as_bytes().to_vec()),
            headers: record
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.as_bytes().to_vec())))
                .collect(),
            ..RawRecord::default()
        };
        let offset = state.append(&record.topic, partition, raw)?;
        Ok(DeliveryReport { partition, offset })
    }
}
