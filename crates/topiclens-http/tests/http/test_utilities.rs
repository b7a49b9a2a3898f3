use reqwest::Response;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use topiclens::client::{GroupDescription, GroupMember, InMemoryCluster};
use topiclens::{BrokerInfo, CancelHandle, TopicLens, TopicPartitionAssignment, cancel_pair};
use topiclens_http::{create_app_state, create_router};

pub const BASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Two brokers, an `orders` topic with two partitions and one stable consumer group.
pub fn test_cluster() -> InMemoryCluster {
    InMemoryCluster::new()
        .with_broker(2, "kafka-2", 9092)
        .with_broker(1, "kafka-1", 9092)
        .with_topic("orders", 2)
        .with_topic_config("orders", "retention.ms", "3600000")
        .with_group(GroupDescription {
            group_id: "billing".to_string(),
            state: "Stable".to_string(),
            coordinator: BrokerInfo {
                id: 1,
                host: "kafka-1".to_string(),
                port: 9092,
            },
            members: vec![GroupMember {
                member_id: "billing-worker-1".to_string(),
                client_id: "billing-worker".to_string(),
                host: "/10.0.0.7".to_string(),
                assignment: vec![TopicPartitionAssignment {
                    topic: "orders".to_string(),
                    partition: 0,
                }],
            }],
        })
}

/// The real router served on an ephemeral port, backed by an in-memory cluster.
pub struct TestServer {
    pub port: u16,
    pub cluster: InMemoryCluster,
    shutdown: CancelHandle,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_cluster(test_cluster()).await
    }

    pub async fn start_with_cluster(
        cluster: InMemoryCluster,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let lens = TopicLens::with_client(Arc::new(cluster.clone()), BASE_TIMEOUT);
        let (shutdown, signal) = cancel_pair();
        let app_state = create_app_state(lens, "test".to_string(), signal);
        let app = create_router(app_state, BASE_TIMEOUT * 3);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            port,
            cluster,
            shutdown,
            task,
        })
    }

    /// Fires the shutdown signal that in-flight requests observe.
    pub fn cancel_requests(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(server: &TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://127.0.0.1:{}", server.port),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client
            .put(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<Response> {
        self.client
            .delete(format!("{}{path}", self.base_url))
            .send()
            .await
    }
}

/// Asserts the shared error shape and returns its body.
pub async fn expect_error(response: Response, status: u16) -> Value {
    assert_eq!(response.status(), status);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], status);
    assert!(body["message"].is_string());
    body
}
