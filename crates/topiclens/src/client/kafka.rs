//! [`ClusterClient`] backed by librdkafka.
//!
//! Admin requests go through one shared `AdminClient`. Calls librdkafka only
//! exposes synchronously (metadata, group lists, watermarks) run on the
//! blocking pool.

use super::assignment::decode_assignment;
use super::coordinator::{resolve_coordinator, OFFSETS_TOPIC};
use super::{
    ClusterClient, ClusterMetadata, ConfigEntry, GroupDescription, GroupListing, GroupMember,
    PollEvent, RawRecord, ReadSession, ReadSessionRequest, StartOffset, TopicMetadata,
    WriteSession,
};
use crate::error::{ClientError, ClientErrorKind};
use crate::types::{BrokerInfo, DeliveryReport, OutgoingRecord, PartitionInfo, PartitionOffsets, TopicSpec};
use async_trait::async_trait;
use log::{debug, trace, warn};
use rdkafka::admin::{
    AdminClient, AdminOptions, AlterConfig, NewTopic, ResourceSpecifier, TopicReplication,
    TopicResult,
};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::metadata::Metadata;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CLIENT_ID: &str = "topiclens";

/// Settings every client handle shares. Topic-scoped metadata lookups must
/// never create the topic they are checking for.
fn base_config(bootstrap_servers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", bootstrap_servers)
        .set("client.id", CLIENT_ID)
        .set("allow.auto.create.topics", "false");
    config
}

/// Throwaway group for a watermark lookup, never shared between calls.
fn watermark_group_id() -> String {
    format!("{CLIENT_ID}-watermarks-{}", Uuid::new_v4())
}

fn classify(code: RDKafkaErrorCode) -> ClientErrorKind {
    match code {
        RDKafkaErrorCode::UnknownTopicOrPartition
        | RDKafkaErrorCode::UnknownTopic
        | RDKafkaErrorCode::UnknownPartition => ClientErrorKind::UnknownTopicOrPartition,
        RDKafkaErrorCode::TopicAlreadyExists => ClientErrorKind::TopicAlreadyExists,
        RDKafkaErrorCode::GroupIdNotFound => ClientErrorKind::GroupNotFound,
        RDKafkaErrorCode::OperationTimedOut | RDKafkaErrorCode::RequestTimedOut => {
            ClientErrorKind::TimedOut
        }
        RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::AllBrokersDown => {
            ClientErrorKind::Transport
        }
        RDKafkaErrorCode::BrokerNotAvailable | RDKafkaErrorCode::LeaderNotAvailable => {
            ClientErrorKind::BrokerNotAvailable
        }
        RDKafkaErrorCode::InvalidConfig
        | RDKafkaErrorCode::InvalidPartitions
        | RDKafkaErrorCode::InvalidReplicationFactor
        | RDKafkaErrorCode::InvalidTopic
        | RDKafkaErrorCode::PolicyViolation => ClientErrorKind::InvalidRequest,
        _ => ClientErrorKind::Other,
    }
}

fn code_error(code: RDKafkaErrorCode, message: String) -> ClientError {
    ClientError::new(classify(code), message)
}

impl From<KafkaError> for ClientError {
    fn from(err: KafkaError) -> Self {
        let kind = err
            .rdkafka_error_code()
            .map(classify)
            .unwrap_or(ClientErrorKind::Other);
        ClientError::new(kind, err.to_string())
    }
}

async fn run_blocking<T, F>(operation: &'static str, f: F) -> Result<T, ClientError>
where
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        ClientError::new(
            ClientErrorKind::Other,
            format!("{operation} task did not complete: {e}"),
        )
    })?
}

fn project_metadata(metadata: &Metadata) -> ClusterMetadata {
    let brokers = metadata
        .brokers()
        .iter()
        .map(|b| BrokerInfo {
            id: b.id(),
            host: b.host().to_string(),
            port: b.port(),
        })
        .collect();

    let topics = metadata
        .topics()
        .iter()
        .map(|t| {
            let mut partitions: Vec<PartitionInfo> = t
                .partitions()
                .iter()
                .map(|p| PartitionInfo {
                    id: p.id(),
                    leader: p.leader(),
                    replicas: p.replicas().to_vec(),
                    isr: p.isr().to_vec(),
                })
                .collect();
            partitions.sort_by_key(|p| p.id);
            TopicMetadata {
                name: t.name().to_string(),
                partitions,
                error: t.error().map(|e| {
                    let code = RDKafkaErrorCode::from(e);
                    code_error(code, format!("topic '{}': {code}", t.name()))
                }),
            }
        })
        .collect();

    ClusterMetadata { brokers, topics }
}

fn first_topic_result(results: Vec<TopicResult>) -> Result<(), ClientError> {
    match results.into_iter().next() {
        Some(Err((name, code))) => Err(code_error(code, format!("topic '{name}': {code}"))),
        _ => Ok(()),
    }
}

/// Shared handle to a Kafka cluster.
pub struct KafkaClusterClient {
    bootstrap_servers: String,
    admin: Arc<AdminClient<DefaultClientContext>>,
}

impl KafkaClusterClient {
    pub fn connect(brokers: &[String]) -> Result<Self, ClientError> {
        if brokers.is_empty() {
            return Err(ClientError::new(
                ClientErrorKind::InvalidRequest,
                "no Kafka brokers provided",
            ));
        }
        let bootstrap_servers = brokers.join(",");
        let admin: AdminClient<DefaultClientContext> = base_config(&bootstrap_servers).create()?;
        debug!("Created Kafka admin client for {bootstrap_servers}");
        Ok(Self {
            bootstrap_servers,
            admin: Arc::new(admin),
        })
    }

    fn client_config(&self) -> ClientConfig {
        base_config(&self.bootstrap_servers)
    }

    fn admin_options(timeout: Duration) -> AdminOptions {
        AdminOptions::new()
            .request_timeout(Some(timeout))
            .operation_timeout(Some(timeout))
    }
}

#[async_trait]
impl ClusterClient for KafkaClusterClient {
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<ClusterMetadata, ClientError> {
        let admin = Arc::clone(&self.admin);
        let topic = topic.map(str::to_string);
        run_blocking("fetch metadata", move || {
            let metadata = admin.inner().fetch_metadata(topic.as_deref(), timeout)?;
            Ok(project_metadata(&metadata))
        })
        .await
    }

    async fn describe_topic_config(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> Result<Vec<ConfigEntry>, ClientError> {
        let resource = ResourceSpecifier::Topic(topic);
        let results = self
            .admin
            .describe_configs(&[resource], &Self::admin_options(timeout))
            .await?;
        let resource = match results.into_iter().next() {
            Some(Ok(resource)) => resource,
            Some(Err(code)) => {
                return Err(code_error(code, format!("describe config of '{topic}': {code}")));
            }
            None => {
                return Err(ClientError::new(
                    ClientErrorKind::Other,
                    format!("no config returned for topic '{topic}'"),
                ));
            }
        };
        Ok(resource
            .entries
            .into_iter()
            .map(|entry| ConfigEntry {
                name: entry.name,
                value: entry.value,
                is_default: entry.is_default,
            })
            .collect())
    }

    async fn create_topic(&self, spec: &TopicSpec, timeout: Duration) -> Result<(), ClientError> {
        let mut new_topic = NewTopic::new(
            &spec.name,
            spec.num_partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        for (key, value) in &spec.config {
            new_topic = new_topic.set(key, value);
        }
        let results = self
            .admin
            .create_topics(&[new_topic], &Self::admin_options(timeout))
            .await?;
        first_topic_result(results)
    }

    async fn delete_topic(&self, topic: &str, timeout: Duration) -> Result<(), ClientError> {
        let results = self
            .admin
            .delete_topics(&[topic], &Self::admin_options(timeout))
            .await?;
        first_topic_result(results)
    }

    async fn alter_topic_config(
        &self,
        topic: &str,
        config: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut alteration = AlterConfig::new(ResourceSpecifier::Topic(topic));
        for (key, value) in config {
            alteration = alteration.set(key, value);
        }
        let results = self
            .admin
            .alter_configs(&[alteration], &Self::admin_options(timeout))
            .await?;
        match results.into_iter().next() {
            Some(Err((_, code))) => Err(code_error(
                code,
                format!("alter config of '{topic}': {code}"),
            )),
            _ => Ok(()),
        }
    }

    async fn list_groups(&self, timeout: Duration) -> Result<Vec<GroupListing>, ClientError> {
        let admin = Arc::clone(&self.admin);
        run_blocking("list groups", move || {
            let groups = admin.inner().fetch_group_list(None, timeout)?;
            Ok(groups
                .groups()
                .iter()
                .map(|g| GroupListing {
                    group_id: g.name().to_string(),
                    state: Some(g.state().to_string()).filter(|s| !s.is_empty()),
                })
                .collect())
        })
        .await
    }

    async fn describe_group(
        &self,
        group_id: &str,
        timeout: Duration,
    ) -> Result<GroupDescription, ClientError> {
        let admin = Arc::clone(&self.admin);
        let group_id = group_id.to_string();
        run_blocking("describe group", move || {
            let groups = admin.inner().fetch_group_list(Some(&group_id), timeout)?;
            let group = groups
                .groups()
                .iter()
                .find(|g| g.name() == group_id && g.state() != "Dead")
                .ok_or_else(|| {
                    ClientError::new(
                        ClientErrorKind::GroupNotFound,
                        format!("group '{group_id}' is not known to the cluster"),
                    )
                })?;

            let members = group
                .members()
                .iter()
                .map(|m| {
                    let assignment = match m.assignment() {
                        Some(bytes) => decode_assignment(bytes).unwrap_or_else(|e| {
                            warn!("Ignoring undecodable assignment of member {}: {e}", m.id());
                            Vec::new()
                        }),
                        None => Vec::new(),
                    };
                    GroupMember {
                        member_id: m.id().to_string(),
                        client_id: m.client_id().to_string(),
                        host: m.client_host().to_string(),
                        assignment,
                    }
                })
                .collect();

            let coordinator = match admin.inner().fetch_metadata(Some(OFFSETS_TOPIC), timeout) {
                Ok(metadata) => resolve_coordinator(&group_id, &project_metadata(&metadata)),
                Err(e) => {
                    debug!("Coordinator lookup for group {group_id} failed: {e}");
                    None
                }
            };

            Ok(GroupDescription {
                group_id: group_id.clone(),
                state: group.state().to_string(),
                coordinator: coordinator.unwrap_or_else(BrokerInfo::unknown),
                members,
            })
        })
        .await
    }

    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: i32,
        timeout: Duration,
    ) -> Result<PartitionOffsets, ClientError> {
        let mut config = self.client_config();
        config.set("group.id", watermark_group_id());
        let topic = topic.to_string();
        run_blocking("fetch watermarks", move || {
            let consumer: BaseConsumer = config.create()?;
            let (low, high) = consumer.fetch_watermarks(&topic, partition, timeout)?;
            Ok(PartitionOffsets { low, high })
        })
        .await
    }

    async fn open_read_session(
        &self,
        request: &ReadSessionRequest,
    ) -> Result<Box<dyn ReadSession>, ClientError> {
        let consumer: StreamConsumer = self
            .client_config()
            .set("group.id", &request.session_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "10000")
            .set("socket.timeout.ms", "10000")
            .set("max.poll.interval.ms", "30000")
            .set("fetch.max.bytes", "5242880")
            .set("receive.message.max.bytes", "5243392")
            .create()?;

        let offset = match request.start {
            StartOffset::Beginning => Offset::Beginning,
            StartOffset::Offset(offset) => Offset::Offset(offset),
        };
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(&request.topic, request.partition, offset)?;
        consumer.assign(&assignment)?;
        trace!(
            "Opened read session {} on {}/{} from {:?}",
            request.session_id, request.topic, request.partition, request.start
        );

        Ok(Box::new(KafkaReadSession { consumer }))
    }

    async fn open_write_session(&self) -> Result<Box<dyn WriteSession>, ClientError> {
        let producer: FutureProducer = self
            .client_config()
            .set("acks", "all")
            .set("message.timeout.ms", "10000")
            .create()?;
        Ok(Box::new(KafkaWriteSession { producer }))
    }
}

struct KafkaReadSession {
    consumer: StreamConsumer,
}

fn raw_record(message: &BorrowedMessage<'_>) -> RawRecord {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| (h.key.to_string(), h.value.map(<[u8]>::to_vec)))
                .collect()
        })
        .unwrap_or_default();

    RawRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp_ms: message.timestamp().to_millis(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
        headers,
    }
}

#[async_trait]
impl ReadSession for KafkaReadSession {
    async fn poll(&mut self, timeout: Duration) -> PollEvent {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => PollEvent::Empty,
            Ok(Ok(message)) => PollEvent::Record(raw_record(&message)),
            Ok(Err(err)) => PollEvent::Error(err.into()),
        }
    }
}

impl Drop for KafkaReadSession {
    fn drop(&mut self) {
        if let Err(e) = self.consumer.unassign() {
            trace!("Unassign on read session release failed: {e}");
        }
    }
}

struct KafkaWriteSession {
    producer: FutureProducer,
}

#[async_trait]
impl WriteSession for KafkaWriteSession {
    async fn send(
        &self,
        record: &OutgoingRecord,
        timeout: Duration,
    ) -> Result<DeliveryReport, ClientError> {
        let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
        for (key, value) in &record.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let mut outgoing: FutureRecord<'_, str, str> =
            FutureRecord::to(&record.topic).headers(headers);
        if let Some(key) = &record.key {
            outgoing = outgoing.key(key.as_str());
        }
        if let Some(value) = &record.value {
            outgoing = outgoing.payload(value.as_str());
        }
        if let Some(partition) = record.partition {
            outgoing = outgoing.partition(partition);
        }

        match self.producer.send(outgoing, timeout).await {
            Ok((partition, offset)) => Ok(DeliveryReport { partition, offset }),
            Err((err, _message)) => Err(err.into()),
        }
    }
}
