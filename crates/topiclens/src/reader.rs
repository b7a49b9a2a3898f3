//! Bounded message window reader.
//!
//! A read resolves its start offset, opens a read session scoped to one
//! topic-partition and drains it until the limit is met, the partition looks
//! caught up, the deadline passes, or the caller cancels. Whatever was
//! collected before a deadline or cancellation is returned, not discarded.

use crate::cancel::CancelSignal;
use crate::client::{PollEvent, RawRecord, ReadSession, ReadSessionRequest, StartOffset};
use crate::connection::Connection;
use crate::error::{ClientError, ClientErrorKind, LensError};
use crate::types::{OffsetSpec, PARTITION_UNASSIGNED, PartitionOffsets, TopicMessage};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// How far back a `latest` read reaches, whatever the requested limit.
pub const LATEST_WINDOW_CAP: usize = 100;
/// Consecutive empty polls after which a read with results counts as caught up.
pub const MAX_EMPTY_POLLS: u32 = 5;
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_LIMIT: usize = 100;

const SESSION_ID_PREFIX: &str = "topiclens-reader-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub topic: String,
    /// `PARTITION_UNASSIGNED` skips the partition existence check.
    pub partition: i32,
    pub offset: OffsetSpec,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LimitReached,
    CaughtUp,
    DeadlineExceeded,
    Cancelled,
    /// `latest` on a partition with no retrievable messages; no session was opened.
    EmptyPartition,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::LimitReached => "limit reached",
            StopReason::CaughtUp => "caught up",
            StopReason::DeadlineExceeded => "deadline exceeded",
            StopReason::Cancelled => "cancelled",
            StopReason::EmptyPartition => "empty partition",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageWindow {
    pub messages: Vec<TopicMessage>,
    /// Offset the session was positioned at; `None` for the log start or an empty partition.
    pub start_offset: Option<i64>,
    pub stop: StopReason,
}

impl MessageWindow {
    pub fn is_cancelled(&self) -> bool {
        self.stop == StopReason::Cancelled
    }
}

/// A failed read together with the messages collected before the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowError {
    pub error: LensError,
    pub partial: Vec<TopicMessage>,
}

impl From<LensError> for WindowError {
    fn from(error: LensError) -> Self {
        Self {
            error,
            partial: Vec::new(),
        }
    }
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} messages collected)",
            self.error,
            self.partial.len()
        )
    }
}

impl std::error::Error for WindowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Start offset for a `latest` read, or `None` when the partition is empty.
pub fn resolve_latest_start(offsets: PartitionOffsets, limit: usize) -> Option<i64> {
    if offsets.is_empty() {
        return None;
    }
    let window = limit.min(LATEST_WINDOW_CAP) as i64;
    Some(offsets.low.max(offsets.high - window))
}

fn lossy(bytes: Option<Vec<u8>>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

/// Decodes a polled record; absent keys, payloads and header values become empty strings.
pub fn decode_record(record: RawRecord) -> TopicMessage {
    let headers: BTreeMap<String, String> = record
        .headers
        .into_iter()
        .map(|(key, value)| (key, lossy(value)))
        .collect();
    TopicMessage {
        topic: record.topic,
        partition: record.partition,
        offset: record.offset,
        timestamp: record
            .timestamp_ms
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|t| t.to_rfc3339()),
        key: lossy(record.key),
        value: lossy(record.payload),
        headers,
    }
}

#[derive(Clone)]
pub struct WindowReader {
    connection: Connection,
}

impl WindowReader {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Reads up to `request.limit` messages from one partition.
    ///
    /// The whole call is bounded by twice the base timeout. The drain loop
    /// gets at most the base timeout of that budget, and whatever it collected
    /// when the budget runs out is returned as a partial window.
    #[tracing::instrument(
        level = "debug",
        skip(self, request, cancel),
        fields(topic = %request.topic, partition = request.partition, offset = %request.offset)
    )]
    pub async fn read_window(
        &self,
        request: &WindowRequest,
        cancel: &CancelSignal,
    ) -> Result<MessageWindow, WindowError> {
        let budget = self.connection.timeout() * 2;
        let call_deadline = Instant::now() + budget;

        let (mut session, start) =
            match tokio::time::timeout_at(call_deadline, self.open(request)).await {
                Ok(Ok(Some(opened))) => opened,
                Ok(Ok(None)) => {
                    return Ok(MessageWindow {
                        messages: Vec::new(),
                        start_offset: None,
                        stop: StopReason::EmptyPartition,
                    });
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(LensError::upstream(
                        "read messages",
                        ClientError::new(
                            ClientErrorKind::TimedOut,
                            format!("no read session within {budget:?}"),
                        ),
                    )
                    .into());
                }
            };

        // the session is dropped, and so released, on every return below
        let (messages, stop) = self
            .drain(session.as_mut(), request.limit, call_deadline, cancel)
            .await?;
        debug!(
            "Read {} messages from {}/{} ({stop})",
            messages.len(),
            request.topic,
            request.partition
        );

        Ok(MessageWindow {
            messages,
            start_offset: match start {
                StartOffset::Beginning => None,
                StartOffset::Offset(offset) => Some(offset),
            },
            stop,
        })
    }

    /// Validates the request, resolves the start offset and opens the session.
    /// `None` means a `latest` read on an empty partition.
    async fn open(
        &self,
        request: &WindowRequest,
    ) -> Result<Option<(Box<dyn ReadSession>, StartOffset)>, LensError> {
        if request.topic.trim().is_empty() {
            return Err(LensError::validation("topic", "topic name is required"));
        }
        if request.limit == 0 {
            return Err(LensError::validation("limit", "limit must be greater than 0"));
        }

        let topic = self
            .connection
            .require_topic(&request.topic, "get topic metadata")
            .await?;
        if request.partition != PARTITION_UNASSIGNED && !topic.has_partition(request.partition) {
            return Err(LensError::PartitionNotFound {
                topic: request.topic.clone(),
                partition: request.partition,
            });
        }

        let start = match request.offset {
            OffsetSpec::Earliest => StartOffset::Beginning,
            OffsetSpec::At(offset) => StartOffset::Offset(offset),
            OffsetSpec::Latest => {
                let offsets = self
                    .connection
                    .client()
                    .fetch_watermarks(&request.topic, request.partition, self.connection.timeout())
                    .await
                    .map_err(|e| LensError::upstream("get partition offsets", e))?;
                match resolve_latest_start(offsets, request.limit) {
                    Some(start) => StartOffset::Offset(start),
                    None => {
                        debug!(
                            "Partition {}/{} is empty at offset {}",
                            request.topic, request.partition, offsets.high
                        );
                        return Ok(None);
                    }
                }
            }
        };

        let session_request = ReadSessionRequest {
            topic: request.topic.clone(),
            partition: request.partition,
            start,
            session_id: format!("{SESSION_ID_PREFIX}{}", Uuid::new_v4()),
        };
        let session = self
            .connection
            .client()
            .open_read_session(&session_request)
            .await
            .map_err(|e| LensError::upstream("create read session", e))?;
        Ok(Some((session, start)))
    }

    async fn drain(
        &self,
        session: &mut dyn ReadSession,
        limit: usize,
        call_deadline: Instant,
        cancel: &CancelSignal,
    ) -> Result<(Vec<TopicMessage>, StopReason), WindowError> {
        let deadline = call_deadline.min(Instant::now() + self.connection.timeout());
        let mut messages = Vec::with_capacity(limit.min(LATEST_WINDOW_CAP));
        let mut empty_polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok((messages, StopReason::Cancelled));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok((messages, StopReason::DeadlineExceeded));
            }

            match session.poll(POLL_INTERVAL.min(deadline - now)).await {
                PollEvent::Record(record) => {
                    empty_polls = 0;
                    trace!("Polled offset {}", record.offset);
                    messages.push(decode_record(record));
                    if messages.len() >= limit {
                        return Ok((messages, StopReason::LimitReached));
                    }
                }
                PollEvent::Empty => {
                    empty_polls += 1;
                    if empty_polls >= MAX_EMPTY_POLLS && !messages.is_empty() {
                        return Ok((messages, StopReason::CaughtUp));
                    }
                }
                PollEvent::Error(e) if e.is_recoverable() => {
                    empty_polls = 0;
                    warn!("Ignoring recoverable poll error: {e}");
                }
                PollEvent::Error(e) => {
                    return Err(WindowError {
                        error: LensError::upstream("read messages", e),
                        partial: messages,
                    });
                }
            }
        }
    }
}
