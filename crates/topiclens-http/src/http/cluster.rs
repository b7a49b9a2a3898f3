//! Health and broker route handlers

use super::common::{BrokersResponse, HandlerError, HealthCheckResponse, lens_error};
use super::server::AppState;
use axum::{extract::State, response::Json};
use log::trace;

pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthCheckResponse> {
    trace!("GET /health");
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        service: "topiclens".to_string(),
        environment: app_state.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[tracing::instrument(level = "debug", skip(app_state))]
pub async fn get_brokers(
    State(app_state): State<AppState>,
) -> Result<Json<BrokersResponse>, HandlerError> {
    match app_state.lens.metadata.get_brokers().await {
        Ok(brokers) => {
            trace!("GET /clusters - {} brokers", brokers.len());
            Ok(Json(BrokersResponse { brokers }))
        }
        Err(error) => Err(lens_error("GET /clusters", &error)),
    }
}
