//! Gateway connection integration tests
//!
//! Scripted gateway sessions pushed through a `GatewayConnection`, checking
//! what the application handler ends up receiving.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use chat_common::{OverflowStrategy, QueueOptions, TimeoutStrategy};
use chat_gateway_client::connection::ConnectionError;
use chat_gateway_client::protocol::RecoveryAction;
use chat_gateway_client::queue::{QueueError, ReconnectReason};
use integration_tests::{buffered_options, fixtures::*, TestClient};

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_starts_session() {
    let mut client = TestClient::start(&QueueOptions::default()).unwrap();
    let session_id = unique_session_id();

    assert!(client.send(&hello(41_250)).await.unwrap().is_none());
    client.send(&ready(&session_id, 1)).await.unwrap();
    client.send_all(&message_stream(&[2, 3])).await.unwrap();

    assert_eq!(client.delivered().await, vec![1, 2, 3]);
    assert_eq!(
        client.recorder.events(),
        vec!["READY", "MESSAGE_CREATE", "MESSAGE_CREATE"]
    );

    let session = client.connection.session().unwrap();
    assert_eq!(session.id(), session_id);
    assert_eq!(session.last_sequence(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_rejected_without_session() {
    let mut client = TestClient::start(&buffered_options(100, 4)).unwrap();

    let err = client
        .connection
        .handle_frame(&message_create(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::NoSession));

    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    let err = client
        .connection
        .handle_frame(&unsequenced("TYPING_START"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::MissingSequence { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_carries_last_sequence() {
    let mut client = TestClient::start(&buffered_options(100, 4)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send_all(&message_stream(&[2, 5, 3])).await.unwrap();

    let beat = client.connection.heartbeat_message();
    assert_eq!(beat.d, Some(serde_json::json!(5)));

    client.send(&heartbeat_ack()).await.unwrap();
    assert!(client.connection.heartbeat().is_acked());
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_delivered_in_order() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client
        .send_all(&message_stream(&[4, 2, 6, 3, 5]))
        .await
        .unwrap();

    assert_eq!(client.delivered().await, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_wraparound_across_session() {
    let mut client = TestClient::start(&buffered_options(9, 10)).unwrap();
    client.send(&ready(&unique_session_id(), 8)).await.unwrap();
    client.send_all(&message_stream(&[0, 9, 1])).await.unwrap();

    assert_eq!(client.delivered().await, vec![8, 9, 0, 1]);
    assert_eq!(client.connection.session().unwrap().last_sequence(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_delivered_once() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client
        .send_all(&message_stream(&[3, 3, 2, 2, 1, 4]))
        .await
        .unwrap();

    assert_eq!(client.delivered().await, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_pass_through_keeps_arrival_order() {
    let options = QueueOptions::default().with_max_sequence_number(9);
    let mut client = TestClient::start(&options).unwrap();
    client.send(&ready(&unique_session_id(), 8)).await.unwrap();
    client.send_all(&message_stream(&[0, 9, 1])).await.unwrap();

    assert_eq!(client.delivered().await, vec![8, 0, 9, 1]);
}

// ============================================================================
// Overflow Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_drop_incoming_on_overflow() {
    let mut client = TestClient::start(&buffered_options(100, 2)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client
        .send_all(&message_stream(&[3, 4, 5, 2]))
        .await
        .unwrap();

    assert_eq!(client.delivered().await, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_throw_exception_surfaces_overflow() {
    let options =
        buffered_options(100, 1).with_overflow_strategy(OverflowStrategy::ThrowException);
    let mut client = TestClient::start(&options).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send(&message_create(3)).await.unwrap();

    let err = client
        .connection
        .handle_frame(&message_create(4))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Queue(QueueError::BufferOverflow {
            sequence: 4,
            expected: 2,
            capacity: 1,
        })
    ));

    client.send(&message_create(2)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_overflow_reconnect_becomes_full_reconnect() {
    let options =
        buffered_options(100, 2).with_overflow_strategy(OverflowStrategy::RequestReconnect);
    let mut client = TestClient::start(&options).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1]);
    client.send_all(&message_stream(&[3, 4, 5])).await.unwrap();

    let request = client.connection.next_reconnect_request().await;
    assert_eq!(request.reason, ReconnectReason::BufferOverflow);
    assert!(client.connection.session().is_none());
    assert!(client.connection.queue().is_none());
    assert!(client.connection.try_reconnect_request().await.is_none());

    // A fresh READY starts over with a new queue
    client.send(&ready(&unique_session_id(), 40)).await.unwrap();
    client.send(&message_create(41)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 40, 41]);
}

// ============================================================================
// Timeout Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_skips_missing() {
    let options = buffered_options(100, 10).with_wait_timeout(Duration::from_millis(50));
    let mut client = TestClient::start(&options).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send_all(&message_stream(&[3, 4])).await.unwrap();

    assert_eq!(client.delivered().await, vec![1]);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(client.delivered().await, vec![1, 3, 4]);
    assert_eq!(client.connection.queue().unwrap().expected_sequence(), 5);

    // The skipped frame is stale by now
    client.send(&message_create(2)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_reconnect() {
    let options = buffered_options(100, 10)
        .with_wait_timeout(Duration::from_millis(50))
        .with_timeout_strategy(TimeoutStrategy::RequestReconnect);
    let mut client = TestClient::start(&options).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send(&message_create(3)).await.unwrap();

    let request = tokio::time::timeout(
        Duration::from_secs(1),
        client.connection.next_reconnect_request(),
    )
    .await
    .unwrap();
    assert_eq!(request.reason, ReconnectReason::WaitTimeout);
    assert!(matches!(
        request.cause,
        QueueError::WaitTimeout { expected: 2, .. }
    ));
    assert_eq!(client.delivered().await, vec![1]);
}

// ============================================================================
// Recovery Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_and_resume() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    let session_id = unique_session_id();
    client.send(&ready(&session_id, 1)).await.unwrap();
    client.send_all(&message_stream(&[2, 4])).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 2]);

    let action = client.send(&reconnect()).await.unwrap();
    assert_eq!(action, Some(RecoveryAction::Resume));

    let resume = client
        .connection
        .begin_resume("Bearer token")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resume.session_id, session_id);
    assert_eq!(resume.seq, 2);

    // The gateway replays everything after `seq`
    client.send_all(&message_stream(&[3, 4])).await.unwrap();
    client.send(&resumed(5)).await.unwrap();

    assert_eq!(client.delivered().await, vec![1, 2, 3, 4, 5]);
    assert_eq!(client.recorder.events().last().map(String::as_str), Some("RESUMED"));
}

#[tokio::test(start_paused = true)]
async fn test_resume_right_after_dispatch_loses_nothing() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    let session_id = unique_session_id();
    client.send(&ready(&session_id, 1)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1]);

    // The socket drops before the handler sees 2 and 3
    client.send_all(&message_stream(&[2, 3])).await.unwrap();
    client.send(&reconnect()).await.unwrap();
    let resume = client
        .connection
        .begin_resume("Bearer token")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resume.seq, 1);

    client.send_all(&message_stream(&[2, 3])).await.unwrap();
    client.send(&resumed(4)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_pass_through_resume_after_newest_delivery() {
    let mut client = TestClient::start(&QueueOptions::default()).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send(&message_create(5)).await.unwrap();

    let resume = client
        .connection
        .begin_resume("Bearer token")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resume.seq, 5);

    client.send(&resumed(6)).await.unwrap();
    assert_eq!(client.delivered().await, vec![1, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_actions() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();

    let action = client.send(&invalid_session(true)).await.unwrap();
    assert_eq!(action, Some(RecoveryAction::Resume));
    assert!(client.connection.session().is_some());

    let action = client.send(&invalid_session(false)).await.unwrap();
    assert_eq!(action, Some(RecoveryAction::FullReconnect));
    assert!(client.connection.session().is_none());
    assert!(client
        .connection
        .begin_resume("Bearer token")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_codes_map_to_recovery() {
    let mut client = TestClient::start(&QueueOptions::default()).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();

    assert_eq!(
        client.connection.handle_close(4008).await,
        RecoveryAction::Resume
    );
    assert!(client.connection.session().is_some());

    assert_eq!(
        client.connection.handle_close(4009).await,
        RecoveryAction::FullReconnect
    );
    assert!(client.connection.session().is_none());

    assert_eq!(
        client.connection.handle_close(4012).await,
        RecoveryAction::Terminate
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_delivery() {
    let mut client = TestClient::start(&buffered_options(100, 10)).unwrap();
    client.send(&ready(&unique_session_id(), 1)).await.unwrap();
    client.send(&message_create(3)).await.unwrap();

    client.connection.shutdown().await;
    client.connection.shutdown().await;

    assert!(client.connection.queue().is_none());
    assert!(matches!(
        client.connection.handle_frame(&message_create(2)).await,
        Err(ConnectionError::NoSession)
    ));
}
