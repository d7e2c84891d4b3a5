//! Kafka transport for Streambind.
//!
//! Implements the [`MessageTransport`] seam over rdkafka. Works against
//! Apache Kafka, Redpanda, or any Kafka-compatible broker; the framework
//! never touches the wire protocol itself.
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits: an offset is committed
//! only after the message has been handed to the dispatch loop's channel.
//! If the process crashes before the commit, the message is redelivered,
//! so handlers must tolerate duplicates. Ordering is guaranteed within a
//! partition; partition assignment across workers sharing a consumer group
//! is the broker's consumer-group protocol.
//!
//! # Example
//!
//! ```no_run
//! use streambind_kafka::KafkaTransport;
//!
//! # fn example() -> Result<(), streambind_core::error::TransportError> {
//! let _transport = KafkaTransport::builder()
//!     .bootstrap("localhost:9092")
//!     .producer_acks("all")
//!     .compression("lz4")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;
use streambind_core::bindings::OffsetReset;
use streambind_core::broker::{BrokerConfig, TransportSecurity};
use streambind_core::error::TransportError;
use streambind_core::transport::{
    InboundMessage, MessageStream, MessageTransport, TransportFactory, TransportFuture,
};

/// Kafka-backed transport, one per worker.
///
/// Holds a producer for the publish path; each subscription creates its own
/// streaming consumer so per-binding offset-reset policies apply cleanly.
pub struct KafkaTransport {
    producer: FutureProducer,
    bootstrap: String,
    security: TransportSecurity,
    timeout: Duration,
    buffer_size: usize,
}

impl KafkaTransport {
    /// Connect with defaults derived from a resolved broker config.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionFailed`] when the producer cannot be
    /// created from the configuration.
    pub fn connect(broker: &BrokerConfig) -> Result<Self, TransportError> {
        Self::builder()
            .bootstrap(broker.bootstrap())
            .security(broker.security)
            .build()
    }

    /// Create a builder for custom producer settings.
    #[must_use]
    pub fn builder() -> KafkaTransportBuilder {
        KafkaTransportBuilder::default()
    }

    fn security_protocol(security: TransportSecurity) -> &'static str {
        match security {
            TransportSecurity::Plaintext => "plaintext",
            TransportSecurity::Tls => "ssl",
        }
    }
}

/// Builder for [`KafkaTransport`].
#[derive(Default)]
pub struct KafkaTransportBuilder {
    bootstrap: Option<String>,
    security: Option<TransportSecurity>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    buffer_size: Option<usize>,
}

impl KafkaTransportBuilder {
    /// Set the bootstrap servers (e.g. `"localhost:9092"`).
    #[must_use]
    pub fn bootstrap(mut self, bootstrap: impl Into<String>) -> Self {
        self.bootstrap = Some(bootstrap.into());
        self
    }

    /// Set the transport security mode (default: plaintext).
    #[must_use]
    pub const fn security(mut self, security: TransportSecurity) -> Self {
        self.security = Some(security);
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` or `"all"` (default `"1"`).
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec: `"none"`, `"gzip"`, `"snappy"`, `"lz4"`, `"zstd"`.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Producer send timeout (default: 5 seconds).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Inbound channel capacity per subscription (default: 1000).
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Build the transport, creating the producer.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionFailed`] when bootstrap servers are
    /// missing or the producer cannot be created.
    pub fn build(self) -> Result<KafkaTransport, TransportError> {
        let bootstrap = self.bootstrap.ok_or_else(|| {
            TransportError::ConnectionFailed("bootstrap servers not configured".to_string())
        })?;
        let security = self.security.unwrap_or_default();

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &bootstrap)
            .set("security.protocol", KafkaTransport::security_protocol(security))
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set("compression.type", self.compression.as_deref().unwrap_or("none"));

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            TransportError::ConnectionFailed(format!("failed to create producer: {e}"))
        })?;

        tracing::info!(
            bootstrap = %bootstrap,
            security = KafkaTransport::security_protocol(security),
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            "Kafka transport created"
        );

        Ok(KafkaTransport {
            producer,
            bootstrap,
            security,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            buffer_size: self.buffer_size.unwrap_or(1000),
        })
    }
}

impl MessageTransport for KafkaTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportFuture<'_, ()> {
        let topic = topic.to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let record = FutureRecord::<(), _>::to(&topic).payload(&payload);
            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        "message published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, error = %kafka_error, "publish failed");
                    Err(TransportError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[String],
        offset_reset: OffsetReset,
        group_id: &str,
    ) -> TransportFuture<'_, MessageStream> {
        let topics = topics.to_vec();
        let group_id = group_id.to_string();
        let bootstrap = self.bootstrap.clone();
        let security = self.security;
        let buffer_size = self.buffer_size;

        Box::pin(async move {
            // Manual commits for at-least-once delivery.
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &bootstrap)
                .set("security.protocol", Self::security_protocol(security))
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", offset_reset.as_str())
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| TransportError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| TransportError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: e.to_string(),
                })?;

            tracing::info!(
                topics = ?topics,
                group = %group_id,
                offset_reset = offset_reset.as_str(),
                "subscribed"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The spawned task owns the consumer and forwards raw messages;
            // offsets are committed only after a successful hand-off.
            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();
                while let Some(next) = stream.next().await {
                    match next {
                        Ok(message) => {
                            let inbound = message.payload().map_or_else(
                                || Err(TransportError::Receive("message has no payload".to_string())),
                                |payload| {
                                    Ok(InboundMessage::new(message.topic(), payload.to_vec()))
                                },
                            );

                            if tx.send(inbound).await.is_err() {
                                // Receiver dropped: exit without committing so
                                // the message is redelivered elsewhere.
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "offset commit failed (message may be redelivered)"
                                );
                            }
                        }
                        Err(e) => {
                            let err = TransportError::Receive(e.to_string());
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                tracing::debug!("consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

/// [`TransportFactory`] giving each worker its own [`KafkaTransport`].
#[derive(Default, Clone)]
pub struct KafkaTransportFactory {
    producer_acks: Option<String>,
    compression: Option<String>,
}

impl KafkaTransportFactory {
    /// Factory with default producer settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer acknowledgment mode applied to every connection.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec applied to every connection.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }
}

impl TransportFactory for KafkaTransportFactory {
    fn connect(&self, broker: &BrokerConfig) -> TransportFuture<'_, Arc<dyn MessageTransport>> {
        let bootstrap = broker.bootstrap();
        let security = broker.security;
        let acks = self.producer_acks.clone();
        let compression = self.compression.clone();

        Box::pin(async move {
            let mut builder = KafkaTransport::builder()
                .bootstrap(bootstrap)
                .security(security);
            if let Some(acks) = acks {
                builder = builder.producer_acks(acks);
            }
            if let Some(compression) = compression {
                builder = builder.compression(compression);
            }
            let transport = builder.build()?;
            Ok(Arc::new(transport) as Arc<dyn MessageTransport>)
        })
    }
}
