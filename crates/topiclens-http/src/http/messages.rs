//! Message read and publish route handlers

use super::common::{
    HandlerError, MessagesQuery, MessagesResponse, PublishRequest, PublishResponse, bad_request,
    lens_error,
};
use super::server::AppState;
use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use log::{debug, trace};
use topiclens::OutgoingRecord;

#[tracing::instrument(level = "debug", skip(app_state, query), fields(topic = %topic))]
pub async fn get_messages(
    State(app_state): State<AppState>,
    Path(topic): Path<String>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<MessagesResponse>, HandlerError> {
    let operation = format!("GET /topics/{topic}/messages");
    let Query(query) = query.map_err(|e| bad_request(&operation, e.body_text()))?;
    let request = query
        .into_window_request(topic)
        .map_err(|error| lens_error(&operation, &error))?;

    match app_state
        .lens
        .reader
        .read_window(&request, &app_state.shutdown)
        .await
    {
        Ok(window) => {
            trace!(
                "{operation} - {} messages from partition {} ({})",
                window.messages.len(),
                request.partition,
                window.stop
            );
            let cancelled = window.is_cancelled();
            Ok(Json(MessagesResponse {
                topic: request.topic,
                partition: request.partition,
                offset: window.start_offset,
                count: window.messages.len(),
                messages: window.messages,
                cancelled,
            }))
        }
        Err(failure) => {
            debug!(
                "{operation} - dropping {} partially read messages",
                failure.partial.len()
            );
            Err(lens_error(&operation, &failure.error))
        }
    }
}

#[tracing::instrument(level = "debug", skip(app_state, request), fields(topic = %topic))]
pub async fn publish_message(
    State(app_state): State<AppState>,
    Path(topic): Path<String>,
    request: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>), HandlerError> {
    let operation = format!("POST /topics/{topic}/messages");
    let Json(request) = request.map_err(|e| bad_request(&operation, e.body_text()))?;

    let record = OutgoingRecord {
        topic: topic.clone(),
        partition: request.partition,
        key: request.key,
        value: request.value,
        headers: request.headers,
    };

    match app_state
        .lens
        .publisher
        .publish(record, &app_state.shutdown)
        .await
    {
        Ok(report) => {
            trace!(
                "{operation} - partition {}, offset {}",
                report.partition, report.offset
            );
            Ok((
                StatusCode::CREATED,
                Json(PublishResponse {
                    message: "Message published".to_string(),
                    topic,
                    partition: report.partition,
                    offset: report.offset,
                }),
            ))
        }
        Err(error) => Err(lens_error(&operation, &error)),
    }
}
