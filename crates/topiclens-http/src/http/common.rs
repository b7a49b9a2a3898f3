//! HTTP API request and response types

use axum::{http::StatusCode, response::Json};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topiclens::reader::{DEFAULT_LIMIT, WindowRequest};
use topiclens::{
    BrokerInfo, ConsumerGroupDetails, ConsumerGroupInfo, ErrorKind, LensError, OffsetSpec,
    TopicInfo, TopicMessage,
};

/// Status for requests abandoned because the server is shutting down.
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// ERROR SHAPE
// =============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: &str, detail: Option<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.to_string(),
            detail,
        }
    }

    pub fn bad_request(detail: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request", Some(detail))
    }
}

pub fn error_status(error: &LensError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Cancelled => StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
    }
}

impl From<&LensError> for ErrorResponse {
    fn from(error: &LensError) -> Self {
        let message = match error.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Conflict => "Resource already exists",
            ErrorKind::Upstream => "Kafka request failed",
            ErrorKind::Cancelled => "Request cancelled",
        };
        Self::new(error_status(error), message, Some(error.to_string()))
    }
}

/// Logs a failed operation and turns it into the JSON error reply.
pub fn lens_error(operation: &str, error: &LensError) -> HandlerError {
    if error.is_client_error() {
        warn!("{operation} rejected: {error}");
    } else {
        error!("{operation} failed: {error}");
    }
    (error_status(error), Json(ErrorResponse::from(error)))
}

pub fn bad_request(operation: &str, detail: String) -> HandlerError {
    warn!("{operation} rejected: {detail}");
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(detail)))
}

// =============================================================================
// CLUSTER AND GROUP RESPONSES
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub service: String,
    pub environment: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize)]
pub struct BrokersResponse {
    pub brokers: Vec<BrokerInfo>,
}

#[derive(Serialize, Deserialize)]
pub struct GroupsResponse {
    pub groups: Vec<ConsumerGroupInfo>,
}

#[derive(Serialize, Deserialize)]
pub struct GroupResponse {
    pub group: ConsumerGroupDetails,
}

// =============================================================================
// TOPIC API TYPES
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicInfo>,
}

#[derive(Serialize, Deserialize)]
pub struct TopicResponse {
    pub topic: TopicInfo,
}

#[derive(Serialize, Deserialize)]
pub struct TopicMutationResponse {
    pub message: String,
    pub topic: TopicInfo,
}

#[derive(Serialize, Deserialize)]
pub struct DeleteTopicResponse {
    pub message: String,
    pub topic: String,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateTopicConfigRequest {
    pub config: BTreeMap<String, String>,
}

/// Refreshed topic detail, or the submitted config when the refresh failed.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdatedTopic {
    Refreshed(TopicInfo),
    Requested {
        name: String,
        config: BTreeMap<String, String>,
    },
}

#[derive(Serialize, Deserialize)]
pub struct UpdateTopicConfigResponse {
    pub message: String,
    pub topic: UpdatedTopic,
}

// =============================================================================
// MESSAGE API TYPES
// =============================================================================

/// Raw query of a message read; parsed by hand so bad values get the JSON error shape.
#[derive(Serialize, Deserialize, Default)]
pub struct MessagesQuery {
    pub partition: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl MessagesQuery {
    pub fn into_window_request(self, topic: String) -> Result<WindowRequest, LensError> {
        let partition = match self.partition.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => match raw.parse::<i32>() {
                Ok(partition) if partition >= topiclens::PARTITION_UNASSIGNED => partition,
                _ => {
                    return Err(LensError::validation(
                        "partition",
                        &format!("partition must be an integer >= -1 (got '{raw}')"),
                    ));
                }
            },
        };

        let offset = match self.offset.as_deref().map(str::trim) {
            None | Some("") => OffsetSpec::Earliest,
            Some(raw) => raw
                .parse::<OffsetSpec>()
                .map_err(|e| LensError::validation("offset", &e.to_string()))?,
        };

        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(LensError::validation(
                        "limit",
                        &format!("limit must be a positive integer (got '{raw}')"),
                    ));
                }
            },
        };

        Ok(WindowRequest {
            topic,
            partition,
            offset,
            limit,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct MessagesResponse {
    pub topic: String,
    pub partition: i32,
    /// Offset the read started from; absent for the partition start or an empty partition.
    pub offset: Option<i64>,
    pub count: usize,
    pub messages: Vec<TopicMessage>,
    pub cancelled: bool,
}

#[derive(Serialize, Deserialize, Default)]
pub struct PublishRequest {
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub partition: Option<i32>,
}

#[derive(Serialize, Deserialize)]
pub struct PublishResponse {
    pub message: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}
