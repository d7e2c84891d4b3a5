//! Error taxonomy for the Streambind framework.
//!
//! Errors fall into four families with different propagation rules:
//!
//! - [`ConfigurationError`] — declaration mistakes (unknown broker, late
//!   binding, unbound producer). Fatal at startup: the process must not run
//!   with a broken declaration.
//! - [`ValidationError`] — a single payload failed its schema. Per-message
//!   and non-fatal: the dispatch runtime logs and skips the message and
//!   keeps consuming.
//! - [`LifecycleError`] — shared-resource setup failed or a resource was
//!   accessed outside its valid window. Fatal: a worker must not run with
//!   half-initialized state.
//! - [`TransportError`] — broker connectivity. Retried with backoff while a
//!   worker is starting; exhausting retries is fatal with the last cause.

use thiserror::Error;

/// Declaration-time configuration errors.
///
/// All of these indicate the application declaration itself is wrong, so
/// they are fatal at startup: the supervisor refuses to spawn workers and
/// the process exits non-zero.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The broker name passed at launch has no registered configuration.
    #[error("unknown broker '{name}' (registered: {known:?})")]
    UnknownBroker {
        /// The name that failed to resolve.
        name: String,
        /// Names that are registered, for the diagnostic.
        known: Vec<String>,
    },

    /// A binding was declared after the registry was sealed.
    #[error("late binding for topic '{topic}': bindings are immutable once the application is built")]
    LateBinding {
        /// The topic of the rejected binding.
        topic: String,
    },

    /// A publish was routed to a topic with no producer binding.
    #[error("no producer binding for topic '{topic}'")]
    UnboundProducer {
        /// The unregistered topic.
        topic: String,
    },

    /// A second producer binding was declared for the same topic.
    #[error("duplicate producer binding for topic '{topic}'")]
    DuplicateProducer {
        /// The topic that was already bound.
        topic: String,
    },

    /// The worker count passed at launch was zero or unparseable.
    #[error("invalid worker count: {reason}")]
    InvalidWorkerCount {
        /// Why the value was rejected.
        reason: String,
    },
}

/// Per-message schema validation failures.
///
/// These never escape the dispatch runtime as process faults: the offending
/// message is logged and skipped, and consumption continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The payload is not a well-formed document at all.
    #[error("malformed payload on topic '{topic}': {reason}")]
    Malformed {
        /// Topic the payload arrived on (or was destined for).
        topic: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// A required field is absent.
    #[error("topic '{topic}': missing required field '{field}'")]
    MissingField {
        /// Topic being validated.
        topic: String,
        /// The absent field.
        field: String,
    },

    /// A field is present but has the wrong type.
    #[error("topic '{topic}': field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        /// Topic being validated.
        topic: String,
        /// The offending field.
        field: String,
        /// The declared type.
        expected: String,
        /// What the payload actually carried.
        actual: String,
    },

    /// A field decoded to the right type but violates its constraint.
    #[error("topic '{topic}': field '{field}' violates constraint: {constraint}")]
    ConstraintViolated {
        /// Topic being validated.
        topic: String,
        /// The offending field.
        field: String,
        /// Human description of the violated constraint.
        constraint: String,
    },

    /// No schema is bound for the topic in the validated direction.
    #[error("topic '{topic}' has no {direction} schema bound")]
    NoSchema {
        /// The topic with no binding.
        topic: String,
        /// "consumer" or "producer".
        direction: String,
    },
}

/// Shared-resource lifecycle errors.
///
/// `OutsideScope` is a programming error (resource read before setup
/// finished or after teardown began); `SetupFailed` aborts worker startup.
/// Both are fatal.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A resource was read outside the enter/exit window.
    #[error("resource '{resource}' accessed outside the lifecycle scope")]
    OutsideScope {
        /// The resource that was read.
        resource: String,
    },

    /// A resource failed to acquire during `enter()`.
    #[error("setup of resource '{resource}' failed: {reason}")]
    SetupFailed {
        /// The resource that failed.
        resource: String,
        /// Why acquisition failed.
        reason: String,
    },

    /// A handler asked for a resource that was never registered.
    #[error("no resource named '{resource}' in the lifecycle context")]
    MissingResource {
        /// The requested name.
        resource: String,
    },

    /// A resource exists under the name but is not the requested type.
    #[error("resource '{resource}' is not of the requested type")]
    TypeMismatch {
        /// The requested name.
        resource: String,
    },
}

/// Broker connectivity and delivery errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not establish a connection to the broker.
    #[error("connection to broker failed: {0}")]
    ConnectionFailed(String),

    /// A publish was not acknowledged.
    #[error("publish to topic '{topic}' failed: {reason}")]
    PublishFailed {
        /// The destination topic.
        topic: String,
        /// Underlying cause.
        reason: String,
    },

    /// Subscribing to consumer topics failed.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// Underlying cause.
        reason: String,
    },

    /// The broker delivered an error instead of a message.
    #[error("receive error: {0}")]
    Receive(String),
}

impl TransportError {
    /// Whether the dispatch runtime should retry the operation with backoff.
    ///
    /// Only connection establishment is retried; per-message delivery errors
    /// are surfaced to the loop instead.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::SubscriptionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_broker_names_candidates() {
        let err = ConfigurationError::UnknownBroker {
            name: "staging".to_string(),
            known: vec!["local".to_string(), "prod".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("staging"));
        assert!(msg.contains("local"));
    }

    #[test]
    fn validation_error_identifies_topic_field_constraint() {
        let err = ValidationError::ConstraintViolated {
            topic: "input_data".to_string(),
            field: "sepal_length".to_string(),
            constraint: "non-negative".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("input_data"));
        assert!(msg.contains("sepal_length"));
        assert!(msg.contains("non-negative"));
    }

    #[test]
    fn connection_failures_are_retryable_publishes_are_not() {
        assert!(TransportError::ConnectionFailed("down".to_string()).is_retryable());
        assert!(
            !TransportError::PublishFailed {
                topic: "t".to_string(),
                reason: "nack".to_string(),
            }
            .is_retryable()
        );
    }
}
