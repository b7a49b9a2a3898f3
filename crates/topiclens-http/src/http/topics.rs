//! Topic route handlers

use super::common::{
    DeleteTopicResponse, HandlerError, TopicMutationResponse, TopicResponse, TopicsResponse,
    UpdateTopicConfigRequest, UpdateTopicConfigResponse, UpdatedTopic, bad_request, lens_error,
};
use super::server::AppState;
use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use log::{trace, warn};
use topiclens::{TopicInfo, TopicSpec};

#[tracing::instrument(level = "debug", skip(app_state))]
pub async fn list_topics(
    State(app_state): State<AppState>,
) -> Result<Json<TopicsResponse>, HandlerError> {
    match app_state.lens.metadata.list_topics().await {
        Ok(topics) => {
            trace!("GET /topics - {} topics", topics.len());
            Ok(Json(TopicsResponse { topics }))
        }
        Err(error) => Err(lens_error("GET /topics", &error)),
    }
}

#[tracing::instrument(level = "debug", skip(app_state), fields(topic = %name))]
pub async fn get_topic(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TopicResponse>, HandlerError> {
    match app_state.lens.metadata.get_topic_details(&name).await {
        Ok(topic) => Ok(Json(TopicResponse { topic })),
        Err(error) => Err(lens_error(&format!("GET /topics/{name}"), &error)),
    }
}

#[tracing::instrument(level = "debug", skip(app_state, request))]
pub async fn create_topic(
    State(app_state): State<AppState>,
    request: Result<Json<TopicSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<TopicMutationResponse>), HandlerError> {
    let Json(spec) = request.map_err(|e| bad_request("POST /topics", e.body_text()))?;

    if let Err(error) = app_state.lens.admin.create_topic(&spec).await {
        return Err(lens_error("POST /topics", &error));
    }

    let topic = match app_state.lens.metadata.get_topic_details(&spec.name).await {
        Ok(topic) => topic,
        Err(error) => {
            warn!(
                "POST /topics - created '{}' but could not refresh it: {error}",
                spec.name
            );
            TopicInfo {
                name: spec.name.clone(),
                num_partitions: spec.num_partitions,
                replication_factor: spec.replication_factor,
                config: spec.config.clone(),
                partitions: Vec::new(),
            }
        }
    };

    trace!("POST /topics - created '{}'", spec.name);
    Ok((
        StatusCode::CREATED,
        Json(TopicMutationResponse {
            message: format!("Topic '{}' created", spec.name),
            topic,
        }),
    ))
}

#[tracing::instrument(level = "debug", skip(app_state), fields(topic = %name))]
pub async fn delete_topic(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteTopicResponse>, HandlerError> {
    match app_state.lens.admin.delete_topic(&name).await {
        Ok(()) => {
            trace!("DELETE /topics/{name} - deleted");
            Ok(Json(DeleteTopicResponse {
                message: format!("Topic '{name}' deleted"),
                topic: name,
            }))
        }
        Err(error) => Err(lens_error(&format!("DELETE /topics/{name}"), &error)),
    }
}

#[tracing::instrument(level = "debug", skip(app_state, request), fields(topic = %name))]
pub async fn update_topic_config(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
    request: Result<Json<UpdateTopicConfigRequest>, JsonRejection>,
) -> Result<Json<UpdateTopicConfigResponse>, HandlerError> {
    let operation = format!("PUT /topics/{name}/config");
    let Json(request) = request.map_err(|e| bad_request(&operation, e.body_text()))?;

    if let Err(error) = app_state
        .lens
        .admin
        .update_topic_config(&name, &request.config)
        .await
    {
        return Err(lens_error(&operation, &error));
    }

    let topic = match app_state.lens.metadata.get_topic_details(&name).await {
        Ok(topic) => UpdatedTopic::Refreshed(topic),
        Err(error) => {
            warn!("{operation} - updated but could not refresh: {error}");
            UpdatedTopic::Requested {
                name: name.clone(),
                config: request.config,
            }
        }
    };

    trace!("{operation} - config updated");
    Ok(Json(UpdateTopicConfigResponse {
        message: format!("Topic '{name}' configuration updated"),
        topic,
    }))
}
