//! Integration tests for [`KafkaTransport`] against a real broker.
//!
//! These validate the behavior only a live Kafka/Redpanda instance can show:
//! - Publish/subscribe round-trip
//! - Earliest offset reset replaying messages published before subscribing
//! - One subscription spanning multiple topics
//! - Consumer-group load balancing across subscribers
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` by default: they need a reachable broker and take
//! seconds each. Point `KAFKA_BOOTSTRAP` at one (default `localhost:9092`)
//! and run:
//!
//! ```bash
//! cargo test -p streambind-kafka --test integration_tests -- --ignored
//! ```
//!
//! # Panics
//!
//! Setup failures use `expect()` and `panic!()`, which is acceptable in
//! test code.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use futures::StreamExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use streambind_core::bindings::OffsetReset;
use streambind_core::transport::MessageTransport;
use streambind_kafka::KafkaTransport;

fn bootstrap() -> String {
    std::env::var("KAFKA_BOOTSTRAP").unwrap_or_else(|_| "localhost:9092".to_string())
}

/// Unique suffix so reruns never see another run's topics or offsets.
fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{prefix}-{nanos}")
}

fn transport() -> KafkaTransport {
    KafkaTransport::builder()
        .bootstrap(bootstrap())
        .build()
        .expect("failed to create transport")
}

/// Publish with retries until topic auto-creation has propagated.
async fn publish_when_ready(transport: &KafkaTransport, topic: &str, payload: &[u8]) {
    for attempt in 1..=30 {
        if transport.publish(topic, payload.to_vec()).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(attempt != 30, "broker never accepted a publish to {topic}");
    }
}

#[tokio::test]
#[ignore]
async fn publish_and_subscribe_round_trip() {
    let transport = transport();
    let topic = unique("round-trip");
    let group = unique("group");

    publish_when_ready(&transport, &topic, b"warmup").await;

    let mut stream = transport
        .subscribe(&[topic.clone()], OffsetReset::Latest, &group)
        .await
        .expect("failed to subscribe");

    // Give the consumer time to join and get its assignment.
    tokio::time::sleep(Duration::from_secs(3)).await;

    transport
        .publish(&topic, b"hello".to_vec())
        .await
        .expect("failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(10), stream.next())
        .await
        .expect("timeout waiting for message")
        .expect("stream ended")
        .expect("receive error");

    assert_eq!(received.topic, topic);
    assert_eq!(received.payload, b"hello".to_vec());
}

#[tokio::test]
#[ignore]
async fn earliest_reset_replays_messages_published_before_subscribing() {
    let transport = transport();
    let topic = unique("replay");
    let group = unique("group");

    publish_when_ready(&transport, &topic, b"first").await;
    transport
        .publish(&topic, b"second".to_vec())
        .await
        .expect("failed to publish");
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut stream = transport
        .subscribe(&[topic.clone()], OffsetReset::Earliest, &group)
        .await
        .expect("failed to subscribe");

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while received.len() < 2 {
            if let Some(next) = stream.next().await {
                received.push(next.expect("receive error").payload);
            }
        }
    })
    .await
    .expect("timeout waiting for replayed messages");

    assert_eq!(received, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[tokio::test]
#[ignore]
async fn one_subscription_spans_multiple_topics() {
    let transport = transport();
    let orders = unique("orders");
    let payments = unique("payments");
    let group = unique("group");

    publish_when_ready(&transport, &orders, b"order").await;
    publish_when_ready(&transport, &payments, b"payment").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut stream = transport
        .subscribe(
            &[orders.clone(), payments.clone()],
            OffsetReset::Earliest,
            &group,
        )
        .await
        .expect("failed to subscribe");

    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while seen.len() < 2 {
            if let Some(next) = stream.next().await {
                let message = next.expect("receive error");
                seen.push((message.topic, message.payload));
            }
        }
    })
    .await
    .expect("timeout waiting for messages");

    // Arrival order across topics is not defined.
    assert!(seen.contains(&(orders, b"order".to_vec())));
    assert!(seen.contains(&(payments, b"payment".to_vec())));
}

#[tokio::test]
#[ignore]
async fn consumer_group_balances_across_subscribers() {
    let transport = transport();
    let topic = unique("balance");
    let group = unique("group");

    publish_when_ready(&transport, &topic, b"warmup").await;

    let mut stream_a = transport
        .subscribe(&[topic.clone()], OffsetReset::Latest, &group)
        .await
        .expect("failed to subscribe a");
    let mut stream_b = transport
        .subscribe(&[topic.clone()], OffsetReset::Latest, &group)
        .await
        .expect("failed to subscribe b");

    // Let the group rebalance before producing.
    tokio::time::sleep(Duration::from_secs(3)).await;

    for i in 0..10u8 {
        transport
            .publish(&topic, vec![i])
            .await
            .expect("failed to publish");
    }

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), async {
        while received.len() < 10 {
            tokio::select! {
                Some(next) = stream_a.next() => {
                    if let Ok(message) = next {
                        received.push(message.payload);
                    }
                }
                Some(next) = stream_b.next() => {
                    if let Ok(message) = next {
                        received.push(message.payload);
                    }
                }
            }
        }
    })
    .await
    .expect("timeout waiting for messages");

    // Every message is delivered exactly once across the group.
    received.sort();
    let expected: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i]).collect();
    assert_eq!(received, expected);
}
