use super::test_utilities::{TestClient, TestServer, expect_error};
use serde_json::Value;
use test_log::test;
use topiclens::{ClientError, ClientErrorKind};
use topiclens::client::memory::Operation;

#[test(tokio::test)]
async fn test_health_check() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper.get("/health").await.unwrap();
    assert_eq!(response.status(), 200);

    let health: Value = response.json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "topiclens");
    assert_eq!(health["environment"], "test");
    assert!(chrono::DateTime::parse_from_rfc3339(health["timestamp"].as_str().unwrap()).is_ok());
}

#[test(tokio::test)]
async fn test_brokers_sorted_by_id() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper.get("/clusters").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let brokers = body["brokers"].as_array().unwrap();
    assert_eq!(brokers.len(), 2);
    assert_eq!(brokers[0]["id"], 1);
    assert_eq!(brokers[0]["host"], "kafka-1");
    assert_eq!(brokers[1]["id"], 2);
}

#[test(tokio::test)]
async fn test_routes_are_mounted_under_api_prefix() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    for path in [
        "/api/v1/health",
        "/api/v1/clusters",
        "/api/v1/topics",
        "/api/v1/consumergroups",
        "/api/v1/consumergroups/billing",
    ] {
        let response = helper.get(path).await.unwrap();
        assert_eq!(response.status(), 200, "GET {path}");
    }
}

#[test(tokio::test)]
async fn test_clusters_under_api_prefix_lists_brokers() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper.get("/api/v1/clusters").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let ids: Vec<i64> = body["brokers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);

    for path in ["/brokers", "/api/v1/consumer-groups"] {
        let response = helper.get(path).await.unwrap();
        assert_eq!(response.status(), 404, "GET {path}");
    }
}

#[test(tokio::test)]
async fn test_upstream_failure_maps_to_500() {
    // Setup
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    server.cluster.fail_next(
        Operation::Metadata,
        ClientError::new(ClientErrorKind::Transport, "Connection refused"),
    );
    let helper = TestClient::new(&server);

    // Action
    let response = helper.get("/clusters").await.unwrap();

    // Expectation
    let body = expect_error(response, 500).await;
    assert!(body["detail"].as_str().unwrap().contains("Connection refused"));
}
