//! Transport abstraction: the seam to the external broker.
//!
//! The framework never re-implements the wire protocol; it talks to the
//! broker through [`MessageTransport`], with a Kafka-backed implementation
//! in `streambind-kafka` and an in-memory one in `streambind-testing`.
//!
//! # Dyn Compatibility
//!
//! The traits use explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so workers can hold `Arc<dyn MessageTransport>` and the
//! supervisor an `Arc<dyn TransportFactory>`.

use crate::bindings::OffsetReset;
use crate::broker::BrokerConfig;
use crate::error::TransportError;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A raw message pulled from the broker, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Construct an inbound message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Stream of raw messages from a subscription.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, TransportError>> + Send>>;

/// Future returned by transport operations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// A connection to the broker, exclusively owned by one worker.
pub trait MessageTransport: Send + Sync {
    /// Publish a validated, serialized payload to a topic.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportFuture<'_, ()>;

    /// Subscribe to a set of topics under one offset-reset policy.
    ///
    /// Called once per policy group during worker startup. Partition
    /// assignment across workers sharing `group_id` is the broker's
    /// consumer-group protocol, not the framework's.
    fn subscribe(
        &self,
        topics: &[String],
        offset_reset: OffsetReset,
        group_id: &str,
    ) -> TransportFuture<'_, MessageStream>;
}

/// Creates one transport connection per worker.
///
/// The supervisor resolves the broker config once; each worker then opens
/// its own connection so no connection state is shared across workers.
pub trait TransportFactory: Send + Sync {
    /// Open a connection against the resolved broker.
    fn connect(&self, broker: &BrokerConfig) -> TransportFuture<'_, Arc<dyn MessageTransport>>;
}
