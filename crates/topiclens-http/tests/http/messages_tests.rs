use super::test_utilities::{BASE_TIMEOUT, TestClient, TestServer, expect_error, test_cluster};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use test_log::test;

fn fill(server: &TestServer, partition: i32, count: usize) {
    for i in 0..count {
        server
            .cluster
            .append("orders", partition, Some(&format!("key-{i}")), &format!("value-{i}"))
            .unwrap();
    }
}

#[test(tokio::test)]
async fn test_read_messages_with_defaults() {
    // Setup
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    fill(&server, 0, 3);
    let helper = TestClient::new(&server);

    // Action
    let response = helper.get("/topics/orders/messages").await.unwrap();

    // Expectation
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["topic"], "orders");
    assert_eq!(body["partition"], 0);
    assert!(body["offset"].is_null());
    assert_eq!(body["count"], 3);
    assert_eq!(body["cancelled"], false);
    assert_eq!(body["messages"][0]["offset"], 0);
    assert_eq!(body["messages"][0]["key"], "key-0");
    assert_eq!(body["messages"][2]["value"], "value-2");
}

#[test(tokio::test)]
async fn test_read_messages_respects_limit_and_offset() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    fill(&server, 1, 10);
    let helper = TestClient::new(&server);

    let response = helper
        .get("/topics/orders/messages?partition=1&offset=4&limit=3")
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["offset"], 4);
    assert_eq!(body["count"], 3);
    let offsets: Vec<i64> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["offset"].as_i64().unwrap())
        .collect();
    assert_eq!(offsets, vec![4, 5, 6]);
}

#[test(tokio::test)]
async fn test_read_latest_messages() {
    // Setup: watermarks low=100, high=105
    let cluster = test_cluster();
    cluster.set_log_start("orders", 0, 100).unwrap();
    let server = TestServer::start_with_cluster(cluster)
        .await
        .expect("Failed to start test server");
    fill(&server, 0, 5);
    let helper = TestClient::new(&server);

    // Action
    let response = helper
        .get("/topics/orders/messages?offset=latest&limit=50")
        .await
        .unwrap();

    // Expectation
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["offset"], 100);
    assert_eq!(body["count"], 5);
    assert_eq!(body["messages"][0]["offset"], 100);
}

#[test(tokio::test)]
async fn test_read_query_validation() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    for query in ["limit=0", "limit=lots", "offset=-3", "offset=newest", "partition=-2"] {
        let response = helper
            .get(&format!("/topics/orders/messages?{query}"))
            .await
            .unwrap();
        let body = expect_error(response, 400).await;
        assert!(body["detail"].is_string(), "{query}");
    }
}

#[test(tokio::test)]
async fn test_read_unknown_topic_or_partition_is_404() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    expect_error(helper.get("/topics/missing/messages").await.unwrap(), 404).await;
    let body = expect_error(
        helper
            .get("/topics/orders/messages?partition=5")
            .await
            .unwrap(),
        404,
    )
    .await;
    assert!(body["detail"].as_str().unwrap().contains("Partition 5"));
}

#[test(tokio::test)]
async fn test_shutdown_returns_partial_read() {
    // Setup: nothing to read, so the request would wait out the deadline
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);
    let started = Instant::now();

    // Action
    let request = tokio::spawn(async move {
        helper
            .get("/topics/orders/messages?partition=1")
            .await
            .unwrap()
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.cancel_requests();
    let response = request.await.unwrap();

    // Expectation
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["count"], 0);
    assert!(started.elapsed() < BASE_TIMEOUT);
}

#[test(tokio::test)]
async fn test_publish_then_read_back() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let response = helper
        .post_json(
            "/topics/orders/messages",
            &json!({
                "key": "order-7",
                "value": "{\"total\":42}",
                "headers": {"content-type": "application/json"},
                "partition": 1
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let published: Value = response.json().await.unwrap();
    assert_eq!(published["topic"], "orders");
    assert_eq!(published["partition"], 1);
    assert_eq!(published["offset"], 0);

    let response = helper
        .get("/topics/orders/messages?partition=1&offset=0&limit=1")
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let message = &body["messages"][0];
    assert_eq!(message["key"], "order-7");
    assert_eq!(message["value"], "{\"total\":42}");
    assert_eq!(message["headers"]["content-type"], "application/json");
}

#[test(tokio::test)]
async fn test_publish_rejections() {
    let server = TestServer::start()
        .await
        .expect("Failed to start test server");
    let helper = TestClient::new(&server);

    let missing_topic = helper
        .post_json("/topics/missing/messages", &json!({"value": "x"}))
        .await
        .unwrap();
    expect_error(missing_topic, 404).await;

    let missing_partition = helper
        .post_json("/topics/orders/messages", &json!({"value": "x", "partition": 9}))
        .await
        .unwrap();
    expect_error(missing_partition, 404).await;

    let bad_body = helper
        .post_json("/topics/orders/messages", &json!({"partition": "first"}))
        .await
        .unwrap();
    expect_error(bad_body, 400).await;
}
