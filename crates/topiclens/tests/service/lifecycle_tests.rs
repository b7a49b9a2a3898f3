//! Topic lifecycle and publish-then-read flows through the facade.

use std::collections::BTreeMap;
use test_log::test;
use topiclens::{CancelSignal, ErrorKind, OffsetSpec, OutgoingRecord, TopicSpec};

use crate::test_utilities::{lens, test_cluster, window};

#[test(tokio::test)]
async fn test_topic_lifecycle() {
    let cluster = test_cluster();
    let lens = lens(&cluster);
    let mut config = BTreeMap::new();
    config.insert("cleanup.policy".to_string(), "compact".to_string());

    lens.admin
        .create_topic(&TopicSpec {
            name: "payments".to_string(),
            num_partitions: 3,
            replication_factor: 2,
            config,
        })
        .await
        .unwrap();

    let topic = lens.metadata.get_topic_details("payments").await.unwrap();
    assert_eq!(topic.num_partitions, 3);
    assert_eq!(topic.replication_factor, 2);
    assert_eq!(topic.config["cleanup.policy"], "compact");

    let mut update = BTreeMap::new();
    update.insert("retention.ms".to_string(), "86400000".to_string());
    lens.admin
        .update_topic_config("payments", &update)
        .await
        .unwrap();
    let topic = lens.metadata.get_topic_details("payments").await.unwrap();
    assert_eq!(topic.config["retention.ms"], "86400000");

    let names: Vec<String> = lens
        .metadata
        .list_topics()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["orders", "payments"]);

    lens.admin.delete_topic("payments").await.unwrap();
    let err = lens.metadata.get_topic_details("payments").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = lens.admin.delete_topic("payments").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test(tokio::test(start_paused = true))]
async fn test_published_record_is_readable() {
    let cluster = test_cluster();
    let lens = lens(&cluster);
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());

    let report = lens
        .publisher
        .publish(
            OutgoingRecord {
                topic: "orders".to_string(),
                partition: Some(1),
                key: Some("order-7".to_string()),
                value: Some("{\"total\":42}".to_string()),
                headers,
            },
            &CancelSignal::never(),
        )
        .await
        .unwrap();

    let result = lens
        .reader
        .read_window(
            &window(1, OffsetSpec::At(report.offset), 1),
            &CancelSignal::never(),
        )
        .await
        .unwrap();

    let message = &result.messages[0];
    assert_eq!(message.offset, report.offset);
    assert_eq!(message.key, "order-7");
    assert_eq!(message.value, "{\"total\":42}");
    assert_eq!(message.headers["content-type"], "application/json");
    assert!(message.timestamp.is_some());
}

#[test(tokio::test)]
async fn test_create_duplicate_topic_conflicts() {
    let cluster = test_cluster();

    let err = lens(&cluster)
        .admin
        .create_topic(&TopicSpec {
            name: "orders".to_string(),
            num_partitions: 1,
            replication_factor: 1,
            config: BTreeMap::new(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
}
