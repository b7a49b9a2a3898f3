//! Consumer group route handlers

use super::common::{GroupResponse, GroupsResponse, HandlerError, lens_error};
use super::server::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use log::trace;

#[tracing::instrument(level = "debug", skip(app_state))]
pub async fn list_groups(
    State(app_state): State<AppState>,
) -> Result<Json<GroupsResponse>, HandlerError> {
    match app_state.lens.metadata.list_consumer_groups().await {
        Ok(groups) => {
            trace!("GET /consumergroups - {} groups", groups.len());
            Ok(Json(GroupsResponse { groups }))
        }
        Err(error) => Err(lens_error("GET /consumergroups", &error)),
    }
}

#[tracing::instrument(level = "debug", skip(app_state), fields(group_id = %group_id))]
pub async fn get_group(
    State(app_state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupResponse>, HandlerError> {
    match app_state
        .lens
        .metadata
        .get_consumer_group_details(&group_id)
        .await
    {
        Ok(group) => {
            trace!(
                "GET /consumergroups/{group_id} - {} members",
                group.members.len()
            );
            Ok(Json(GroupResponse { group }))
        }
        Err(error) => Err(lens_error(
            &format!("GET /consumergroups/{group_id}"),
            &error,
        )),
    }
}
