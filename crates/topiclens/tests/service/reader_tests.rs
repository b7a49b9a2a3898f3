//! Window reader behavior: offset resolution, stop conditions and session release.

use std::time::Duration;
use test_log::test;
use tokio::time::Instant;
use topiclens::client::{PollEvent, StartOffset};
use topiclens::reader::{LATEST_WINDOW_CAP, POLL_INTERVAL};
use topiclens::{
    CancelSignal, ClientError, ClientErrorKind, ErrorKind, LensError, OffsetSpec,
    PARTITION_UNASSIGNED, StopReason, cancel_pair,
};

use crate::test_utilities::{BASE_TIMEOUT, fill, lens, raw, test_cluster, window};

#[test(tokio::test(start_paused = true))]
async fn test_read_never_exceeds_limit() {
    let cluster = test_cluster();
    fill(&cluster, 0, 20);

    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 7), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.messages.len(), 7);
    assert_eq!(result.stop, StopReason::LimitReached);
    assert_eq!(result.messages[0].offset, 0);
    assert_eq!(result.messages[0].key, "key-0");
    assert_eq!(result.messages[6].value, "value-6");
}

#[test(tokio::test(start_paused = true))]
async fn test_explicit_offset_reads_are_repeatable() {
    let cluster = test_cluster();
    fill(&cluster, 1, 10);
    let lens = lens(&cluster);
    let request = window(1, OffsetSpec::At(2), 3);

    let first = lens.reader.read_window(&request, &CancelSignal::never()).await.unwrap();
    let second = lens.reader.read_window(&request, &CancelSignal::never()).await.unwrap();

    let offsets: Vec<i64> = first.messages.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![2, 3, 4]);
    assert_eq!(first.messages, second.messages);
    assert_eq!(first.start_offset, Some(2));
}

#[test(tokio::test(start_paused = true))]
async fn test_latest_reads_from_recent_window() {
    // Setup: watermarks low=100, high=105
    let cluster = test_cluster();
    cluster.set_log_start("orders", 0, 100).unwrap();
    fill(&cluster, 0, 5);

    // Action
    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Latest, 50), &CancelSignal::never())
        .await
        .unwrap();

    // Expectation
    assert_eq!(result.start_offset, Some(100));
    assert_eq!(result.messages.len(), 5);
    assert_eq!(result.messages[0].offset, 100);
    assert_eq!(result.stop, StopReason::CaughtUp);
    assert_eq!(
        cluster.read_session_requests()[0].start,
        StartOffset::Offset(100)
    );
}

#[test(tokio::test(start_paused = true))]
async fn test_latest_window_is_capped() {
    let cluster = test_cluster();
    fill(&cluster, 0, 250);

    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Latest, 500), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.start_offset, Some(150));
    assert_eq!(result.messages.len(), LATEST_WINDOW_CAP);
    assert_eq!(result.messages.last().map(|m| m.offset), Some(249));
}

#[test(tokio::test(start_paused = true))]
async fn test_latest_on_empty_partition_returns_nothing() {
    // Setup: low == high == 10
    let cluster = test_cluster();
    cluster.set_log_start("orders", 0, 10).unwrap();

    // Action
    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Latest, 100), &CancelSignal::never())
        .await
        .unwrap();

    // Expectation: short-circuits before any session is opened
    assert!(result.messages.is_empty());
    assert_eq!(result.stop, StopReason::EmptyPartition);
    assert!(cluster.read_session_requests().is_empty());
}

#[test(tokio::test(start_paused = true))]
async fn test_deadline_returns_partial_window() {
    // Setup: three records, then a partition that never goes quiet for five polls
    let cluster = test_cluster();
    let mut script = vec![
        PollEvent::Record(raw(0, "a")),
        PollEvent::Record(raw(1, "b")),
        PollEvent::Record(raw(2, "c")),
    ];
    for _ in 0..40 {
        script.extend(std::iter::repeat_n(PollEvent::Empty, 4));
        script.push(PollEvent::Error(ClientError::new(
            ClientErrorKind::TimedOut,
            "Local: Timed out",
        )));
    }
    cluster.script_polls(script);
    let started = Instant::now();

    // Action
    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap();

    // Expectation
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.stop, StopReason::DeadlineExceeded);
    assert!(started.elapsed() >= BASE_TIMEOUT);
    assert_eq!(cluster.active_read_sessions(), 0);
}

#[test(tokio::test(start_paused = true))]
async fn test_slow_metadata_still_returns_partial_window() {
    // Setup: metadata eats more than the base timeout, then the partition never goes quiet
    let cluster = test_cluster();
    cluster.set_metadata_delay(Duration::from_secs(6));
    let mut script = vec![
        PollEvent::Record(raw(0, "a")),
        PollEvent::Record(raw(1, "b")),
        PollEvent::Record(raw(2, "c")),
    ];
    for _ in 0..40 {
        script.extend(std::iter::repeat_n(PollEvent::Empty, 4));
        script.push(PollEvent::Error(ClientError::new(
            ClientErrorKind::TimedOut,
            "Local: Timed out",
        )));
    }
    cluster.script_polls(script);
    let started = Instant::now();

    // Action
    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap();

    // Expectation: the drain stops at the call deadline, not the base timeout after it started
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.stop, StopReason::DeadlineExceeded);
    assert!(started.elapsed() <= BASE_TIMEOUT * 2 + POLL_INTERVAL);
    assert_eq!(cluster.active_read_sessions(), 0);
}

#[test(tokio::test(start_paused = true))]
async fn test_setup_past_the_call_budget_is_upstream_error() {
    let cluster = test_cluster();
    cluster.set_metadata_delay(BASE_TIMEOUT * 2 + Duration::from_secs(1));
    let started = Instant::now();

    let err = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(err.error.kind(), ErrorKind::Upstream);
    assert!(err.partial.is_empty());
    assert!(started.elapsed() <= BASE_TIMEOUT * 2 + POLL_INTERVAL);
    assert!(cluster.read_session_requests().is_empty());
}

#[test(tokio::test(start_paused = true))]
async fn test_caught_up_only_after_first_message() {
    let cluster = test_cluster();
    fill(&cluster, 0, 3);
    let lens = lens(&cluster);

    let started = Instant::now();
    let result = lens
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.stop, StopReason::CaughtUp);
    assert!(started.elapsed() < BASE_TIMEOUT);

    // an empty partition keeps polling until the deadline
    let started = Instant::now();
    let result = lens
        .reader
        .read_window(&window(1, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap();
    assert!(result.messages.is_empty());
    assert_eq!(result.stop, StopReason::DeadlineExceeded);
    assert!(started.elapsed() >= BASE_TIMEOUT);
}

#[test(tokio::test(start_paused = true))]
async fn test_reported_offsets_are_used_verbatim() {
    let cluster = test_cluster();
    cluster.script_polls([
        PollEvent::Record(raw(5, "a")),
        PollEvent::Record(raw(9, "b")),
        PollEvent::Record(raw(12, "c")),
    ]);

    let result = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::At(5), 3), &CancelSignal::never())
        .await
        .unwrap();

    let offsets: Vec<i64> = result.messages.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![5, 9, 12]);
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        result.messages[0].timestamp.as_deref(),
        Some("2023-11-14T22:13:20+00:00")
    );
}

#[test(tokio::test(start_paused = true))]
async fn test_fatal_poll_error_keeps_partial_results() {
    let cluster = test_cluster();
    cluster.script_polls([
        PollEvent::Record(raw(0, "a")),
        PollEvent::Record(raw(1, "b")),
        PollEvent::Error(ClientError::new(
            ClientErrorKind::Other,
            "Broker: Message contents does not match its CRC",
        )),
    ]);

    let err = lens(&cluster)
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 10), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(err.error.kind(), ErrorKind::Upstream);
    assert_eq!(err.partial.len(), 2);
    assert_eq!(cluster.active_read_sessions(), 0);
}

#[test(tokio::test(start_paused = true))]
async fn test_cancellation_returns_collected_messages() {
    let cluster = test_cluster();
    fill(&cluster, 0, 2);
    let mut script = vec![PollEvent::Record(raw(0, "a"))];
    script.extend(std::iter::repeat_n(PollEvent::Empty, 3));
    cluster.script_polls(script);
    let (handle, signal) = cancel_pair();
    let reader = lens(&cluster).reader;

    let read = tokio::spawn(async move {
        reader
            .read_window(&window(0, OffsetSpec::Earliest, 10), &signal)
            .await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.cancel();

    let result = read.await.unwrap().unwrap();
    assert!(result.is_cancelled());
    assert_eq!(result.messages.len(), 1);
    assert_eq!(cluster.active_read_sessions(), 0);
}

#[test(tokio::test(start_paused = true))]
async fn test_each_read_uses_a_fresh_session_identity() {
    let cluster = test_cluster();
    fill(&cluster, 0, 1);
    let lens = lens(&cluster);

    for _ in 0..2 {
        lens.reader
            .read_window(&window(0, OffsetSpec::Earliest, 1), &CancelSignal::never())
            .await
            .unwrap();
    }

    let requests = cluster.read_session_requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].session_id, requests[1].session_id);
    assert!(requests.iter().all(|r| r.session_id.starts_with("topiclens-reader-")));
}

#[test(tokio::test)]
async fn test_read_validation_and_not_found() {
    let cluster = test_cluster();
    let lens = lens(&cluster);
    let never = CancelSignal::never();

    let err = lens
        .reader
        .read_window(&window(0, OffsetSpec::Earliest, 0), &never)
        .await
        .unwrap_err();
    assert_eq!(err.error.kind(), ErrorKind::Validation);

    let err = lens
        .reader
        .read_window(&window(9, OffsetSpec::Earliest, 10), &never)
        .await
        .unwrap_err();
    assert_eq!(
        err.error,
        LensError::PartitionNotFound {
            topic: "orders".to_string(),
            partition: 9
        }
    );

    let mut missing = window(0, OffsetSpec::Earliest, 10);
    missing.topic = "missing".to_string();
    let err = lens.reader.read_window(&missing, &never).await.unwrap_err();
    assert_eq!(err.error.kind(), ErrorKind::NotFound);
    assert!(cluster.read_session_requests().is_empty());
}

#[test(tokio::test)]
async fn test_unassigned_partition_skips_existence_check() {
    let cluster = test_cluster();

    let err = lens(&cluster)
        .reader
        .read_window(
            &window(PARTITION_UNASSIGNED, OffsetSpec::Earliest, 10),
            &CancelSignal::never(),
        )
        .await
        .unwrap_err();

    // the session layer, not the metadata check, rejects the sentinel here
    assert!(!matches!(err.error, LensError::PartitionNotFound { .. }));
    assert_eq!(err.error.kind(), ErrorKind::Upstream);
}
