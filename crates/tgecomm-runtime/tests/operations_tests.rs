//! Send, fetch and inbound handling through the session manager

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tgecomm_core::{Dialog, Entity, IncomingMessage, MetricsCollector, TransportError};
use tgecomm_runtime::{
    InboundView, LoopbackTransport, RunOutcome, SessionBuilder, SessionError, StaticPrompt,
};
use tokio_test::assert_ok;

// ----------------------------------------------------------------------------
// Send
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends_never_overlap() {
    let transport = ScriptedTransport::new();
    transport.set_send_delay(Duration::from_millis(50));
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.send("@alice", &format!("message {}", i)).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(transport.send_calls.load(Ordering::SeqCst), 8);
    assert_eq!(transport.max_send_overlap.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.counter("messages_sent"), 8);
    assert_eq!(metrics.timing_stats("send_message").count, 8);
}

#[tokio::test]
async fn test_send_length_boundary() {
    let transport = ScriptedTransport::new();
    let (manager, _metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    assert!(manager.send("@alice", &"x".repeat(4096)).await);
    assert!(!manager.send("@alice", &"x".repeat(4097)).await);
    assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_send_failure_returns_false_and_records() {
    let transport = ScriptedTransport::new();
    transport.fail_sends(TransportError::RateLimited { seconds: 30 });
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    assert!(!manager.send("@alice", "Hello").await);
    assert_eq!(
        manager.try_send("@alice", "Hello").await,
        Err(SessionError::RateLimited { seconds: 30 })
    );
    assert_eq!(metrics.summary().error_types.get("FloodWaitError"), Some(&2));
    assert_eq!(metrics.counter("messages_sent"), 0);
}

// ----------------------------------------------------------------------------
// Fetch
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_fetch_messages_oldest_first_with_senders() {
    let transport = ScriptedTransport::new();
    transport.set_history(
        (1..=12)
            .map(|i| message(i, 1000 + i, &format!("text {}", i)))
            .collect(),
    );
    transport.fail_sender_lookup(1003);
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    let messages = manager.fetch_messages("@group", 12).await;

    let ids: Vec<i64> = messages.iter().map(|m| m.message.id).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    assert_eq!(messages[0].sender_name, "@user1001");
    assert_eq!(messages[2].sender_name, "Unknown");
    assert_eq!(metrics.counter("messages_retrieved"), 12);
    assert_eq!(metrics.timing_stats("get_messages").count, 1);
    // 12 lookups at the default batch size of 5
    assert_eq!(metrics.timing_stats("fetch_batch").count, 3);
}

#[tokio::test]
async fn test_fetch_messages_limit_handling() {
    let transport = ScriptedTransport::new();
    transport.set_history((1..=3).map(|i| message(i, 1, "hi")).collect());
    let mut config = fast_config();
    config.limits.max_messages_limit = 2;
    let (manager, metrics) = session(transport.clone(), config);
    manager.start().await.unwrap();

    assert!(manager.fetch_messages("@group", 0).await.is_empty());
    assert_eq!(transport.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.summary().error_types.get("ValidationError"), Some(&1));

    let clamped = manager.fetch_messages("@group", 50).await;
    let ids: Vec<i64> = clamped.iter().map(|m| m.message.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn test_fetch_messages_failure_is_classified() {
    let transport = ScriptedTransport::new();
    transport.fail_fetches(TransportError::ChatInvalid {
        chat: "@missing".into(),
    });
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    assert!(manager.fetch_messages("@missing", 10).await.is_empty());
    let result = manager.try_fetch_messages("@missing", 10).await;
    assert_eq!(
        result,
        Err(SessionError::NotFoundOrInaccessible {
            target: "@missing".into()
        })
    );
    assert_eq!(metrics.summary().error_types.get("ChatNotFoundError"), Some(&2));
}

#[tokio::test]
async fn test_empty_history_is_not_an_error() {
    let transport = ScriptedTransport::new();
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    let result = manager.try_fetch_messages("@quiet", 10).await;
    assert_eq!(result, Ok(Vec::new()));
    assert_eq!(metrics.summary().error_count, 0);
}

#[tokio::test]
async fn test_fetch_dialogs() {
    let transport = ScriptedTransport::new();
    transport.set_dialogs(vec![
        Dialog { id: 1, name: "Alice".into() },
        Dialog { id: 2, name: "Team".into() },
    ]);
    let (manager, metrics) = session(transport.clone(), fast_config());
    manager.start().await.unwrap();

    assert_eq!(manager.fetch_dialogs(10).await.len(), 2);
    assert_eq!(manager.fetch_dialogs(1).await.len(), 1);
    assert!(manager.fetch_dialogs(0).await.is_empty());
    assert_eq!(metrics.counter("dialogs_retrieved"), 3);
    assert_eq!(metrics.timing_stats("get_dialogs").count, 2);
}

// ----------------------------------------------------------------------------
// Inbound
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_inbound_messages_are_counted_and_forwarded() {
    let transport = ScriptedTransport::new();
    let metrics = Arc::new(MetricsCollector::new());
    let received: Arc<Mutex<Vec<InboundView>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let manager = SessionBuilder::new(transport.clone())
        .with_config(fast_config())
        .with_metrics(metrics.clone())
        .with_prompt(Arc::new(StaticPrompt::new("correct horse")))
        .on_message(move |view| sink.lock().unwrap().push(view))
        .build()
        .unwrap();

    assert!(!transport.deliver(IncomingMessage {
        message: message(1, 5, "too early"),
        sender: None,
        chat: None,
    }));

    manager.start().await.unwrap();
    assert!(transport.deliver(IncomingMessage {
        message: message(2, 5, "Hello"),
        sender: Some(Entity::User {
            id: 5,
            username: None,
            first_name: Some("Bob".into()),
            last_name: None,
        }),
        chat: Some(Entity::Chat {
            id: 100,
            title: Some("Team".into()),
        }),
    }));

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender_name, "Bob");
    assert_eq!(received[0].chat_name, "Team");
    assert_eq!(received[0].body, "Hello");
    assert_eq!(metrics.counter("messages_received"), 1);
}

// ----------------------------------------------------------------------------
// Loopback
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_loopback_session_end_to_end() {
    let transport = Arc::new(LoopbackTransport::default());
    let metrics = Arc::new(MetricsCollector::new());
    let manager = Arc::new(
        SessionBuilder::new(transport.clone())
            .with_config(fast_config())
            .with_metrics(metrics.clone())
            .build()
            .unwrap(),
    );

    assert_ok!(manager.start().await);
    assert!(manager.send("@alice", "first").await);
    assert!(manager.send("@alice", "second").await);

    let messages = manager.fetch_messages("@alice", 10).await;
    let texts: Vec<_> = messages.iter().map(|m| m.message.body()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(messages[0].sender_name, "@loopback");
    assert_eq!(manager.fetch_dialogs(10).await.len(), 1);
    assert_eq!(metrics.counter("messages_received"), 2);

    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run(3).await })
    };
    tokio::task::yield_now().await;
    assert_ok!(manager.disconnect().await);

    assert_eq!(runner.await.unwrap(), Ok(RunOutcome::Stopped));
    assert!(manager.fetch_messages("@alice", 10).await.is_empty());
}
