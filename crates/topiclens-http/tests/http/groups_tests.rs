use super::test_utilities::{TestClient, TestServer, expect_error};
use serde_json::Value;
use test_log::test;

#[test(tokio::test)]
async fn test_list_consumer_groups() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper.get("/consumergroups").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["groupId"], "billing");
    assert_eq!(groups[0]["state"], "Stable");
}

#[test(tokio::test)]
async fn test_consumer_group_details() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper.get("/consumergroups/billing").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let group = &body["group"];
    assert_eq!(group["groupId"], "billing");
    assert_eq!(group["state"], "Stable");
    assert_eq!(group["coordinator"]["id"], 1);
    assert_eq!(group["members"][0]["clientId"], "billing-worker");
    assert_eq!(group["members"][0]["consumerId"], "billing-worker-1");
    assert_eq!(group["members"][0]["assignments"][0]["topic"], "orders");
    assert_eq!(group["topics"], serde_json::json!(["orders"]));
}

#[test(tokio::test)]
async fn test_unknown_consumer_group_is_404() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let body = expect_error(helper.get("/consumergroups/ghost").await.unwrap(), 404).await;
    assert!(body["detail"].as_str().unwrap().contains("ghost"));
}
