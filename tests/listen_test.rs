//! Integration tests for LISTEN/NOTIFY against PostgreSQL
//!
//! Exercises every target shape, batching, dynamic timeouts, signal handling and
//! channel/payload quoting on a live database. Set `DATABASE_URL` to run them;
//! without it the database-backed tests return early.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, raise, sigaction};
use pgnotify::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

// SIGINT is process-wide; tests that raise it run one at a time.
static SIGNAL_LOCK: Mutex<()> = Mutex::const_new(());

const WAIT_LIMIT: Duration = Duration::from_secs(10);

fn database_url() -> Option<String> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping database test");
            None
        }
    }
}

async fn setup_pool(url: &str) -> PgPool {
    PgPool::connect(url)
        .await
        .expect("Failed to connect to database")
}

/// Channel names are database-wide; keep parallel tests apart
fn unique(name: &str) -> String {
    format!("{}_{:08x}", name, rand::random::<u32>())
}

fn current_handler(signal: Signal) -> SigHandler {
    let probe = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let previous = sigaction(signal, &probe).expect("probe sigaction");
        sigaction(signal, &previous).expect("restore probed sigaction");
        previous.handler()
    }
}

async fn next_event(notifications: &mut Notifications<'_>) -> ListenEvent {
    tokio::time::timeout(WAIT_LIMIT, notifications.next())
        .await
        .expect("listener produced an event in time")
        .expect("listener did not fail")
        .expect("sequence does not end on its own")
}

async fn next_notification(notifications: &mut Notifications<'_>) -> Notification {
    loop {
        match next_event(notifications).await {
            ListenEvent::Notification(n) => return n,
            ListenEvent::Timeout => continue,
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_every_target_shape_receives() {
    let Some(url) = database_url() else { return };
    let pool = setup_pool(&url).await;
    let channel = unique("shape");
    let options = || {
        ListenOptions::new([&channel])
            .with_timeout(1.0)
            .without_signal_handling()
    };

    {
        let mut notifications = await_notifications(url.as_str(), options()).await.unwrap();
        let connection = notifications.connection().unwrap();
        assert!(connection.owns_connection());
        assert_eq!(connection.kind(), "dedicated");

        pg_notify(&pool, &channel, "from url").await.unwrap();
        assert_eq!(next_notification(&mut notifications).await.payload, "from url");
    }

    {
        let mut notifications = await_notifications(&pool, options()).await.unwrap();
        assert!(!notifications.connection().unwrap().owns_connection());

        pg_notify(url.as_str(), &channel, "from pool").await.unwrap();
        assert_eq!(next_notification(&mut notifications).await.payload, "from pool");
    }

    let mut listener = PgListener::connect(&url).await.unwrap();
    {
        let mut notifications = await_notifications(&mut listener, options()).await.unwrap();
        assert_eq!(notifications.connection().unwrap().kind(), "borrowed");
        assert!(!notifications.connection().unwrap().owns_connection());

        pg_notify(&pool, &channel, "from listener").await.unwrap();
        let received = next_notification(&mut notifications).await;
        assert_eq!(received.channel, channel);
        assert_eq!(received.payload, "from listener");
    }

    // The caller's connection outlives the sequence and stays subscribed
    pg_notify(&pool, &channel, "after sequence").await.unwrap();
    let received = tokio::time::timeout(WAIT_LIMIT, listener.recv())
        .await
        .expect("notification after sequence")
        .unwrap();
    assert_eq!(received.payload(), "after sequence");
}

#[tokio::test]
async fn test_notification_then_signal() {
    let Some(url) = database_url() else { return };
    let _guard = SIGNAL_LOCK.lock().await;
    let pool = setup_pool(&url).await;
    let hello = unique("hello");
    let hello2 = unique("hello2");

    let mut notifications = await_notifications(
        url.as_str(),
        ListenOptions::new([&hello, &hello2])
            .with_timeout(0.01)
            .with_yield_on_timeout(true)
            .with_handle_signals([Signal::SIGINT]),
    )
    .await
    .unwrap();

    let mut sent = false;
    let mut received = false;
    loop {
        match next_event(&mut notifications).await {
            ListenEvent::Timeout => {
                if !sent {
                    pg_notify(&pool, &hello, "here is my message").await.unwrap();
                    sent = true;
                }
            }
            ListenEvent::Notification(n) => {
                assert_eq!(n.channel, hello);
                assert_eq!(n.payload, "here is my message");
                received = true;
                raise(Signal::SIGINT).unwrap();
            }
            ListenEvent::Signal(signal) => {
                assert_eq!(signal, Signal::SIGINT as i32);
                assert_eq!(signal, 2);
                break;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert!(received);
}

#[tokio::test]
async fn test_repeated_interrupt_cancels() {
    let Some(url) = database_url() else { return };
    let _guard = SIGNAL_LOCK.lock().await;
    let before = current_handler(Signal::SIGINT);

    // Default options intercept SIGINT
    let mut notifications = await_notifications(
        url.as_str(),
        ListenOptions::new([unique("hello")])
            .with_timeout(0.1)
            .with_yield_on_timeout(true),
    )
    .await
    .unwrap();

    let mut yielded = Vec::new();
    let err = loop {
        match tokio::time::timeout(WAIT_LIMIT, notifications.next())
            .await
            .expect("listener produced an event in time")
        {
            Ok(Some(event)) => {
                yielded.push(event);
                raise(Signal::SIGINT).unwrap();
            }
            Ok(None) => panic!("sequence ended without cancellation"),
            Err(err) => break err,
        }
    };

    assert!(matches!(err, ListenError::Cancelled { signal: 2 }));
    assert_eq!(yielded.iter().filter_map(ListenEvent::as_signal).count(), 1);
    assert_eq!(current_handler(Signal::SIGINT), before);
    assert_eq!(notifications.next().await.unwrap(), None);
}

#[tokio::test]
async fn test_dynamic_timeout_batches() {
    let Some(url) = database_url() else { return };
    let pool = setup_pool(&url).await;
    let hello = unique("hello");

    let mut notifications = await_notifications(
        url.as_str(),
        ListenOptions::new([hello.clone(), unique("hello2")])
            .with_dynamic_timeout(|| -1.0)
            .with_yield_on_timeout(true)
            .with_notifications_as_list(true)
            .without_signal_handling(),
    )
    .await
    .unwrap();

    let mut timeouts = 0;
    let batch = loop {
        match next_event(&mut notifications).await {
            ListenEvent::Timeout => {
                if timeouts == 0 {
                    pg_notify(&pool, &hello, "here is my message").await.unwrap();
                }
                timeouts += 1;
            }
            ListenEvent::Batch(batch) => break batch,
            other => panic!("unexpected event {:?}", other),
        }
    };

    assert!(timeouts >= 1);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].channel, hello);
    assert_eq!(batch[0].payload, "here is my message");
}

#[tokio::test]
async fn test_quoted_channels_and_payloads_round_trip() {
    let Some(url) = database_url() else { return };
    let hello = unique("hello");
    let quoted = format!("'{}'", unique("hello2"));
    let double_quoted = format!("dq\"{}", unique("hello4"));
    let hello3 = unique("hello3");
    let injection = format!("'1'); SELECT pg_notify('{}', 'injection'", hello3);

    let mut notifications = await_notifications(
        url.as_str(),
        ListenOptions::new([&hello, &quoted, &hello3, &double_quoted])
            .with_timeout(0.1)
            .with_yield_on_timeout(true)
            .without_signal_handling(),
    )
    .await
    .unwrap();

    let mut sent = false;
    let mut seen = Vec::new();
    loop {
        match next_event(&mut notifications).await {
            ListenEvent::Timeout if !sent => {
                pg_notify(url.as_str(), &hello, "here is my message").await.unwrap();
                pg_notify(url.as_str(), &quoted, &injection).await.unwrap();
                pg_notify(url.as_str(), &double_quoted, "\"; NOTIFY x; --").await.unwrap();
                sent = true;
            }
            ListenEvent::Timeout => break,
            ListenEvent::Notification(n) => {
                if n.channel == hello3 {
                    panic!("sql injection occurred");
                } else if n.channel == hello {
                    assert_eq!(n.payload, "here is my message");
                } else if n.channel == quoted {
                    assert_eq!(n.payload, injection);
                } else if n.channel == double_quoted {
                    assert_eq!(n.payload, "\"; NOTIFY x; --");
                } else {
                    panic!("notification on unexpected channel {:?}", n.channel);
                }
                seen.push(n.channel);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(seen, vec![hello, quoted, double_quoted]);
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct JobQueued {
    id: i64,
    queue: String,
}

#[tokio::test]
async fn test_notify_json() {
    let Some(url) = database_url() else { return };
    let pool = setup_pool(&url).await;
    let channel = unique("jobs");
    let job = JobQueued {
        id: 17,
        queue: "mail".to_string(),
    };

    let mut notifications = await_notifications(
        &pool,
        ListenOptions::new([&channel])
            .with_timeout(Timeout::Never)
            .without_signal_handling(),
    )
    .await
    .unwrap();

    notify_json(&pool, &channel, &job).await.unwrap();

    let received = next_notification(&mut notifications).await;
    assert!(received.process_id > 0);
    assert_eq!(received.payload_json::<JobQueued>().unwrap(), job);
}

#[tokio::test]
async fn test_unreachable_target_fails_to_connect() {
    let err = pg_notify("postgresql://postgres@127.0.0.1:1/postgres", "jobs", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ListenError::Connection(_)));

    let config = DatabaseConfig::new(
        "127.0.0.1".to_string(),
        1,
        "postgres".to_string(),
        "postgres".to_string(),
        "p@ss/w?rd".to_string(),
    )
    .with_connection_timeout_seconds(2);
    let err = pg_notify(&config, "jobs", "x").await.unwrap_err();
    assert!(matches!(err, ListenError::Connection(_)));

    let options = ListenOptions::new(["jobs"]).without_signal_handling();
    let err = await_notifications(&config, options).await.unwrap_err();
    assert!(matches!(err, ListenError::Connection(_)));

    let err = await_notifications("", ListenOptions::new(["jobs"]).without_signal_handling())
        .await
        .unwrap_err();
    assert!(matches!(err, ListenError::InvalidTarget(_)));
}
