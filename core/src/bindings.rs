//! Topic bindings: the declarative map from topics to schemas and handlers.
//!
//! Bindings are declared while the application is being built and are
//! immutable once it enters the running state — the registry is sealed by
//! [`crate::app::ApplicationBuilder::build`] and any later `bind_*` call
//! fails with [`ConfigurationError::LateBinding`]. The sealed registry is
//! shared read-only across all workers.
//!
//! A topic may carry multiple consumer bindings; their handlers run in
//! registration order, which keeps per-topic execution deterministic for
//! test reproducibility. Each producer topic has exactly one binding and
//! therefore exactly one schema.

use crate::error::ConfigurationError;
use crate::handler::Handler;
use crate::schema::MessageSchema;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a new consumer group starts reading on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OffsetReset {
    /// Start from the end of the topic: only new messages.
    #[default]
    Latest,
    /// Start from the earliest available message.
    Earliest,
}

impl OffsetReset {
    /// The wire-level policy string the Kafka client expects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Earliest => "earliest",
        }
    }
}

/// A consumer declaration: topic, schema, offset policy, handler.
#[derive(Clone)]
pub struct ConsumerBinding {
    /// Topic to consume from.
    pub topic: String,
    /// Schema every inbound payload is validated against.
    pub schema: Arc<MessageSchema>,
    /// Where a fresh consumer group starts reading.
    pub offset_reset: OffsetReset,
    /// Handler invoked for each valid message.
    pub handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for ConsumerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerBinding")
            .field("topic", &self.topic)
            .field("schema", &self.schema.name())
            .field("offset_reset", &self.offset_reset)
            .finish_non_exhaustive()
    }
}

/// A producer declaration: topic and the schema its messages must satisfy.
#[derive(Debug, Clone)]
pub struct ProducerBinding {
    /// Topic to publish to.
    pub topic: String,
    /// Schema every outbound message is validated against.
    pub schema: Arc<MessageSchema>,
}

/// Consumer topics grouped by offset policy, for transport subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionGroup {
    /// Offset policy shared by the group.
    pub offset_reset: OffsetReset,
    /// Unique topics, in first-registration order.
    pub topics: Vec<String>,
}

/// The registry of consumer and producer bindings.
///
/// Built once at declaration time; sealed before the runtime starts.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    consumers: Vec<ConsumerBinding>,
    producers: HashMap<String, ProducerBinding>,
    sealed: AtomicBool,
}

impl BindingRegistry {
    /// Create an empty, unsealed registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a consumer binding.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::LateBinding`] once the registry is sealed.
    pub fn bind_consumer(
        &mut self,
        topic: impl Into<String>,
        schema: MessageSchema,
        offset_reset: OffsetReset,
        handler: Arc<dyn Handler>,
    ) -> Result<(), ConfigurationError> {
        let topic = topic.into();
        self.check_unsealed(&topic)?;
        tracing::debug!(topic = %topic, schema = schema.name(), "consumer bound");
        self.consumers.push(ConsumerBinding {
            topic,
            schema: Arc::new(schema),
            offset_reset,
            handler,
        });
        Ok(())
    }

    /// Declare a producer binding.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::LateBinding`] once sealed;
    /// [`ConfigurationError::DuplicateProducer`] if the topic already has a
    /// producer binding.
    pub fn bind_producer(
        &mut self,
        topic: impl Into<String>,
        schema: MessageSchema,
    ) -> Result<(), ConfigurationError> {
        let topic = topic.into();
        self.check_unsealed(&topic)?;
        if self.producers.contains_key(&topic) {
            return Err(ConfigurationError::DuplicateProducer { topic });
        }
        tracing::debug!(topic = %topic, schema = schema.name(), "producer bound");
        self.producers.insert(
            topic.clone(),
            ProducerBinding {
                topic,
                schema: Arc::new(schema),
            },
        );
        Ok(())
    }

    fn check_unsealed(&self, topic: &str) -> Result<(), ConfigurationError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(ConfigurationError::LateBinding {
                topic: topic.to_string(),
            });
        }
        Ok(())
    }

    /// Freeze the registry; all later `bind_*` calls fail.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Whether the registry has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Handlers bound to `topic`, in registration order.
    #[must_use]
    pub fn resolve_consumers(&self, topic: &str) -> Vec<&ConsumerBinding> {
        self.consumers.iter().filter(|b| b.topic == topic).collect()
    }

    /// The single producer binding for `topic`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnboundProducer`] when a handler attempts to
    /// publish to a topic no producer was declared for.
    pub fn resolve_producer(&self, topic: &str) -> Result<&ProducerBinding, ConfigurationError> {
        self.producers
            .get(topic)
            .ok_or_else(|| ConfigurationError::UnboundProducer {
                topic: topic.to_string(),
            })
    }

    /// All consumer bindings, in registration order.
    pub fn consumer_bindings(&self) -> impl Iterator<Item = &ConsumerBinding> {
        self.consumers.iter()
    }

    /// All producer bindings (order unspecified).
    pub fn producer_bindings(&self) -> impl Iterator<Item = &ProducerBinding> {
        self.producers.values()
    }

    /// Consumer topics grouped by offset policy for subscription.
    ///
    /// The underlying Kafka client applies the offset-reset policy per
    /// consumer, so the dispatch runtime opens one subscription stream per
    /// group. Topics keep first-registration order within each group.
    #[must_use]
    pub fn subscription_groups(&self) -> Vec<SubscriptionGroup> {
        let mut groups: Vec<SubscriptionGroup> = Vec::new();
        for binding in &self.consumers {
            let index = groups
                .iter()
                .position(|g| g.offset_reset == binding.offset_reset)
                .unwrap_or_else(|| {
                    groups.push(SubscriptionGroup {
                        offset_reset: binding.offset_reset,
                        topics: Vec::new(),
                    });
                    groups.len() - 1
                });
            let group = &mut groups[index];
            if !group.topics.contains(&binding.topic) {
                group.topics.push(binding.topic.clone());
            }
        }
        groups
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::handler::{OutboundMessage, handler_fn};
    use crate::schema::{Constraint, FieldType, TypedMessage};

    fn noop_handler() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|_message: TypedMessage, _ctx| async move {
            Ok(Vec::<OutboundMessage>::new())
        }))
    }

    fn schema(name: &str) -> MessageSchema {
        MessageSchema::new(name).field("value", FieldType::Float, Constraint::None)
    }

    #[test]
    fn consumers_resolve_in_registration_order() {
        let mut registry = BindingRegistry::new();
        registry
            .bind_consumer("input", schema("A"), OffsetReset::Latest, noop_handler())
            .unwrap();
        registry
            .bind_consumer("input", schema("B"), OffsetReset::Latest, noop_handler())
            .unwrap();
        registry
            .bind_consumer("other", schema("C"), OffsetReset::Earliest, noop_handler())
            .unwrap();

        let bound = registry.resolve_consumers("input");
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].schema.name(), "A");
        assert_eq!(bound[1].schema.name(), "B");
    }

    #[test]
    fn binding_after_seal_fails_with_late_binding() {
        let mut registry = BindingRegistry::new();
        registry.seal();

        let err = registry
            .bind_consumer("input", schema("A"), OffsetReset::Latest, noop_handler())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::LateBinding { ref topic } if topic == "input"));

        let err = registry.bind_producer("out", schema("B")).unwrap_err();
        assert!(matches!(err, ConfigurationError::LateBinding { .. }));
    }

    #[test]
    fn unbound_producer_resolution_fails() {
        let mut registry = BindingRegistry::new();
        registry.bind_producer("predictions", schema("P")).unwrap();

        assert!(registry.resolve_producer("predictions").is_ok());
        let err = registry.resolve_producer("unknown").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnboundProducer { ref topic } if topic == "unknown"));
    }

    #[test]
    fn duplicate_producer_binding_is_rejected() {
        let mut registry = BindingRegistry::new();
        registry.bind_producer("predictions", schema("P")).unwrap();
        let err = registry.bind_producer("predictions", schema("P2")).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateProducer { .. }));
    }

    #[test]
    fn subscription_groups_split_by_offset_policy() {
        let mut registry = BindingRegistry::new();
        registry
            .bind_consumer("a", schema("A"), OffsetReset::Latest, noop_handler())
            .unwrap();
        registry
            .bind_consumer("b", schema("B"), OffsetReset::Earliest, noop_handler())
            .unwrap();
        registry
            .bind_consumer("a", schema("A2"), OffsetReset::Latest, noop_handler())
            .unwrap();
        registry
            .bind_consumer("c", schema("C"), OffsetReset::Latest, noop_handler())
            .unwrap();

        let groups = registry.subscription_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].offset_reset, OffsetReset::Latest);
        assert_eq!(groups[0].topics, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(groups[1].topics, vec!["b".to_string()]);
    }
}
