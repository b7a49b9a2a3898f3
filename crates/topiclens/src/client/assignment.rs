//! Decoder for the consumer protocol member assignment blob.
//!
//! Layout (big endian): `i16 version`, `i32` count of
//! `{ i16-length string topic, i32 count of i32 partitions }`, then a nullable
//! `i32`-length user data blob. Fields appended by later versions are ignored.

use crate::types::TopicPartitionAssignment;
use std::fmt;
use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    Truncated,
    NegativeLength { field: &'static str, length: i64 },
    InvalidUtf8,
}

impl fmt::Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentError::Truncated => write!(f, "assignment data ends early"),
            AssignmentError::NegativeLength { field, length } => {
                write!(f, "negative length {length} for {field}")
            }
            AssignmentError::InvalidUtf8 => write!(f, "topic name is not valid UTF-8"),
        }
    }
}

impl std::error::Error for AssignmentError {}

impl From<std::io::Error> for AssignmentError {
    fn from(_: std::io::Error) -> Self {
        AssignmentError::Truncated
    }
}

fn read_i16<R: Read>(reader: &mut R) -> Result<i16, AssignmentError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(i16::from_be_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, AssignmentError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, AssignmentError> {
    let len = read_i16(reader)?;
    let len = usize::try_from(len).map_err(|_| AssignmentError::NegativeLength {
        field: "topic",
        length: len.into(),
    })?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| AssignmentError::InvalidUtf8)
}

fn read_count<R: Read>(reader: &mut R, field: &'static str) -> Result<usize, AssignmentError> {
    let len = read_i32(reader)?;
    usize::try_from(len).map_err(|_| AssignmentError::NegativeLength {
        field,
        length: len.into(),
    })
}

/// Flattens a member assignment into `(topic, partition)` pairs in encoded order.
///
/// An empty blob is a member with nothing assigned yet.
pub fn decode_assignment(data: &[u8]) -> Result<Vec<TopicPartitionAssignment>, AssignmentError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Cursor::new(data);
    let _version = read_i16(&mut reader)?;

    let topic_count = read_count(&mut reader, "topics")?;
    let mut assignments = Vec::new();
    for _ in 0..topic_count {
        let topic = read_string(&mut reader)?;
        let partition_count = read_count(&mut reader, "partitions")?;
        for _ in 0..partition_count {
            let partition = read_i32(&mut reader)?;
            assignments.push(TopicPartitionAssignment {
                topic: topic.clone(),
                partition,
            });
        }
    }

    // user data is opaque to us; only require that a length prefix is present
    let _user_data_len = read_i32(&mut reader)?;

    Ok(assignments)
}

#[cfg(test)]
pub(crate) fn encode_assignment(topics: &[(&str, &[i32])]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1i16.to_be_bytes());
    buf.extend_from_slice(&(topics.len() as i32).to_be_bytes());
    for (topic, partitions) in topics {
        buf.extend_from_slice(&(topic.len() as i16).to_be_bytes());
        buf.extend_from_slice(topic.as_bytes());
        buf.extend_from_slice(&(partitions.len() as i32).to_be_bytes());
        for partition in partitions.iter() {
            buf.extend_from_slice(&partition.to_be_bytes());
        }
    }
    buf.extend_from_slice(&(-1i32).to_be_bytes());
    buf
}
