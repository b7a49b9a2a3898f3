use super::server::AppState;
use super::{cluster, groups, messages, topics};
use axum::{
    Router,
    routing::{get, put},
};
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Builds the API router. Every route is served both at the root and under `/api/v1`.
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/health", get(cluster::health_check))
        .route("/clusters", get(cluster::get_brokers))
        .route(
            "/topics",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route(
            "/topics/{name}",
            get(topics::get_topic).delete(topics::delete_topic),
        )
        .route("/topics/{name}/config", put(topics::update_topic_config))
        .route(
            "/topics/{name}/messages",
            get(messages::get_messages).post(messages::publish_message),
        )
        .route("/consumergroups", get(groups::list_groups))
        .route("/consumergroups/{group_id}", get(groups::get_group));

    Router::new()
        .merge(api.clone())
        .nest("/api/v1", api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
