//! # Streambind Testing
//!
//! Deterministic test doubles for Streambind applications:
//!
//! - [`InMemoryTransport`] — a broker stand-in that records every publish
//!   and feeds injected payloads to subscribers, honoring offset-reset
//!   semantics (earliest subscribers see messages injected before they
//!   subscribed, latest subscribers only see later ones).
//! - [`InMemoryTransportFactory`] — hands the same shared transport to
//!   every worker, optionally failing the first N connection attempts to
//!   exercise the runtime's backoff path.
//! - [`ProbeResource`] — a lifecycle resource that records acquire/release
//!   order into a shared log and can be made to fail setup.
//!
//! Everything here is synchronous-in-memory and safe to drive from
//! `#[tokio::test]` without a broker.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use streambind_core::bindings::OffsetReset;
use streambind_core::broker::BrokerConfig;
use streambind_core::error::{LifecycleError, TransportError};
use streambind_core::lifecycle::{AcquireFuture, ReleaseFuture, Resource, SharedResource};
use streambind_core::transport::{
    InboundMessage, MessageStream, MessageTransport, TransportFactory, TransportFuture,
};
use tokio::sync::mpsc;

type Feed = mpsc::UnboundedSender<Result<InboundMessage, TransportError>>;

struct Subscriber {
    topics: Vec<String>,
    feed: Feed,
}

/// In-memory broker double.
///
/// Messages injected with [`InMemoryTransport::inject`] are delivered to one
/// matching subscriber (round-robin across subscribers of the same topic,
/// like a consumer group). Publishes are recorded for assertions, never
/// looped back.
#[derive(Default)]
pub struct InMemoryTransport {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    pending: Mutex<Vec<InboundMessage>>,
    subscribers: Mutex<Vec<Subscriber>>,
    round_robin: AtomicUsize,
}

impl InMemoryTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Feed one raw payload to subscribers of `topic`.
    ///
    /// If no subscriber is attached yet the message is parked and delivered
    /// to the next `Earliest` subscriber of the topic.
    pub fn inject(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        let message = InboundMessage::new(topic, payload.into());
        if !self.deliver(&message) {
            if let Ok(mut pending) = self.pending.lock() {
                pending.push(message);
            }
        }
    }

    /// Deliver to one matching subscriber; false when none is attached.
    fn deliver(&self, message: &InboundMessage) -> bool {
        let Ok(subscribers) = self.subscribers.lock() else {
            return false;
        };
        let matching: Vec<&Subscriber> = subscribers
            .iter()
            .filter(|s| s.topics.contains(&message.topic))
            .collect();
        if matching.is_empty() {
            return false;
        }
        let pick = self.round_robin.fetch_add(1, Ordering::SeqCst) % matching.len();
        matching[pick].feed.send(Ok(message.clone())).is_ok()
    }

    /// Push a transport-level receive error into every subscriber stream.
    pub fn inject_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if let Ok(subscribers) = self.subscribers.lock() {
            for subscriber in subscribers.iter() {
                let _ = subscriber
                    .feed
                    .send(Err(TransportError::Receive(reason.clone())));
            }
        }
    }

    /// Drop every subscriber feed, ending all subscription streams.
    ///
    /// Workers observe the end of their inbound stream and drain cleanly.
    pub fn complete(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }

    /// Payloads published to `topic`, in publish order.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .map(|published| {
                published
                    .iter()
                    .filter(|(t, _)| t == topic)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every `(topic, payload)` publish, in order.
    #[must_use]
    pub fn published_all(&self) -> Vec<(String, Vec<u8>)> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    /// Number of attached subscription streams.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl MessageTransport for InMemoryTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportFuture<'_, ()> {
        let topic = topic.to_string();
        Box::pin(async move {
            if let Ok(mut published) = self.published.lock() {
                published.push((topic, payload));
            }
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[String],
        offset_reset: OffsetReset,
        _group_id: &str,
    ) -> TransportFuture<'_, MessageStream> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();

            // Earliest subscribers replay messages injected before they
            // attached; latest subscribers only see what comes after.
            if offset_reset == OffsetReset::Earliest {
                if let Ok(mut pending) = self.pending.lock() {
                    let mut kept = Vec::new();
                    for message in pending.drain(..) {
                        if topics.contains(&message.topic) {
                            let _ = tx.send(Ok(message));
                        } else {
                            kept.push(message);
                        }
                    }
                    *pending = kept;
                }
            }

            if let Ok(mut subscribers) = self.subscribers.lock() {
                subscribers.push(Subscriber { topics, feed: tx });
            }

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

/// Factory that hands every worker the same [`InMemoryTransport`].
///
/// `fail_connects(n)` makes the first `n` connection attempts fail with a
/// retryable [`TransportError::ConnectionFailed`], for exercising the
/// runtime's backoff path.
pub struct InMemoryTransportFactory {
    transport: Arc<InMemoryTransport>,
    failures_left: AtomicUsize,
    connects: AtomicUsize,
}

impl InMemoryTransportFactory {
    /// Wrap a shared transport.
    #[must_use]
    pub fn new(transport: Arc<InMemoryTransport>) -> Self {
        Self {
            transport,
            failures_left: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` connection attempts.
    #[must_use]
    pub fn fail_connects(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Total connection attempts observed.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl TransportFactory for InMemoryTransportFactory {
    fn connect(&self, broker: &BrokerConfig) -> TransportFuture<'_, Arc<dyn MessageTransport>> {
        let bootstrap = broker.bootstrap();
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let remaining = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if remaining {
                return Err(TransportError::ConnectionFailed(format!(
                    "simulated connect failure to {bootstrap}"
                )));
            }
            Ok(Arc::clone(&self.transport) as Arc<dyn MessageTransport>)
        })
    }
}

/// Lifecycle resource double recording acquire/release order.
pub struct ProbeResource {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    value: SharedResource,
    fail_acquire: bool,
}

impl ProbeResource {
    /// A probe named `name` recording into `log`, holding `()` as value.
    #[must_use]
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            log,
            value: Arc::new(()),
            fail_acquire: false,
        }
    }

    /// Store a concrete instance for handlers to read from the context.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.value = value;
        self
    }

    /// Make `acquire` fail, to exercise partial-setup teardown.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    fn record(&self, event: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{event}:{}", self.name));
        }
    }
}

impl Resource for ProbeResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self) -> AcquireFuture<'_> {
        Box::pin(async move {
            if self.fail_acquire {
                return Err(LifecycleError::SetupFailed {
                    resource: self.name.clone(),
                    reason: "probe configured to fail".to_string(),
                });
            }
            self.record("acquire");
            Ok(Arc::clone(&self.value))
        })
    }

    fn release(&self, _instance: SharedResource) -> ReleaseFuture<'_> {
        Box::pin(async move {
            self.record("release");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn earliest_subscriber_replays_parked_messages() {
        let transport = InMemoryTransport::new();
        transport.inject("input", b"one".to_vec());

        let mut stream = transport
            .subscribe(&["input".to_string()], OffsetReset::Earliest, "g")
            .await
            .unwrap();
        transport.inject("input", b"two".to_vec());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload, b"one".to_vec());
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.payload, b"two".to_vec());
    }

    #[tokio::test]
    async fn latest_subscriber_skips_parked_messages() {
        let transport = InMemoryTransport::new();
        transport.inject("input", b"old".to_vec());

        let mut stream = transport
            .subscribe(&["input".to_string()], OffsetReset::Latest, "g")
            .await
            .unwrap();
        transport.inject("input", b"new".to_vec());

        let next = stream.next().await.unwrap().unwrap();
        assert_eq!(next.payload, b"new".to_vec());
    }

    #[tokio::test]
    async fn publishes_are_recorded_per_topic() {
        let transport = InMemoryTransport::new();
        transport.publish("a", b"1".to_vec()).await.unwrap();
        transport.publish("b", b"2".to_vec()).await.unwrap();
        transport.publish("a", b"3".to_vec()).await.unwrap();

        assert_eq!(transport.published("a"), vec![b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(transport.published_all().len(), 3);
    }

    #[tokio::test]
    async fn factory_fails_the_requested_number_of_connects() {
        let transport = InMemoryTransport::new();
        let factory = InMemoryTransportFactory::new(transport).fail_connects(2);
        let broker = BrokerConfig::new("local", "localhost", 9092);

        assert!(factory.connect(&broker).await.is_err());
        assert!(factory.connect(&broker).await.is_err());
        assert!(factory.connect(&broker).await.is_ok());
        assert_eq!(factory.connect_attempts(), 3);
    }
}
