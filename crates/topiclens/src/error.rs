use std::fmt;

/// Structured failure class reported by the broker client layer.
///
/// Boundary code classifies failures by switching on this kind; message text is
/// diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientErrorKind {
    UnknownTopicOrPartition,
    TopicAlreadyExists,
    GroupNotFound,
    TimedOut,
    Transport,
    BrokerNotAvailable,
    InvalidRequest,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LensError {
    Validation {
        field: String,
        message: String,
    },
    TopicNotFound {
        topic: String,
    },
    PartitionNotFound {
        topic: String,
        partition: i32,
    },
    GroupNotFound {
        group_id: String,
        detail: Option<String>,
    },
    TopicAlreadyExists {
        topic: String,
        detail: String,
    },
    Upstream {
        context: String,
        source: ClientError,
    },
    Cancelled {
        context: String,
    },
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeout and transport class errors a polling loop may ride out.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ClientErrorKind::TimedOut
                | ClientErrorKind::Transport
                | ClientErrorKind::BrokerNotAvailable
        )
    }
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientErrorKind::UnknownTopicOrPartition => "unknown topic or partition",
            ClientErrorKind::TopicAlreadyExists => "topic already exists",
            ClientErrorKind::GroupNotFound => "group not found",
            ClientErrorKind::TimedOut => "timed out",
            ClientErrorKind::Transport => "transport failure",
            ClientErrorKind::BrokerNotAvailable => "broker not available",
            ClientErrorKind::InvalidRequest => "invalid request",
            ClientErrorKind::Other => "broker error",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for LensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LensError::Validation { field, message } => {
                write!(f, "Validation error in field '{field}': {message}")
            }
            LensError::TopicNotFound { topic } => write!(f, "Topic '{topic}' not found"),
            LensError::PartitionNotFound { topic, partition } => {
                write!(f, "Partition {partition} does not exist for topic '{topic}'")
            }
            LensError::GroupNotFound { group_id, detail } => match detail {
                Some(detail) => write!(f, "Consumer group '{group_id}' not found: {detail}"),
                None => write!(f, "Consumer group '{group_id}' not found"),
            },
            LensError::TopicAlreadyExists { topic, detail } => {
                write!(f, "Topic '{topic}' already exists: {detail}")
            }
            LensError::Upstream { context, source } => write!(f, "Failed to {context}: {source}"),
            LensError::Cancelled { context } => write!(f, "Request cancelled during {context}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl std::error::Error for LensError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LensError::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl LensError {
    pub fn validation(field: &str, message: &str) -> Self {
        LensError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn upstream(context: &str, source: ClientError) -> Self {
        LensError::Upstream {
            context: context.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LensError::Validation { .. } => ErrorKind::Validation,
            LensError::TopicNotFound { .. }
            | LensError::PartitionNotFound { .. }
            | LensError::GroupNotFound { .. } => ErrorKind::NotFound,
            LensError::TopicAlreadyExists { .. } => ErrorKind::Conflict,
            LensError::Upstream { .. } => ErrorKind::Upstream,
            LensError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict
        )
    }
}
