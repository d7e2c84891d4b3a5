//! The application declaration: brokers, bindings, and lifecycle resources.
//!
//! An [`ApplicationBuilder`] collects declarations during a setup phase and
//! [`ApplicationBuilder::build`] seals them into an immutable
//! [`Application`] before the runtime starts; nothing can be bound after
//! that point.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use streambind_core::app::Application;
//! use streambind_core::bindings::OffsetReset;
//! use streambind_core::broker::BrokerConfig;
//! use streambind_core::handler::{OutboundMessage, handler_fn};
//! use streambind_core::schema::{Constraint, FieldType, MessageSchema, TypedMessage};
//!
//! let app = Application::builder("echo-service")
//!     .broker(BrokerConfig::new("local", "localhost", 9092))
//!     .consumer(
//!         "input",
//!         MessageSchema::new("Input").field("value", FieldType::Float, Constraint::None),
//!         OffsetReset::Earliest,
//!         Arc::new(handler_fn(|message: TypedMessage, _ctx| async move {
//!             Ok(vec![OutboundMessage::new("output", message)])
//!         })),
//!     )
//!     .producer(
//!         "output",
//!         MessageSchema::new("Output").field("value", FieldType::Float, Constraint::None),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert!(app.bindings().is_sealed());
//! ```

use crate::bindings::{BindingRegistry, OffsetReset};
use crate::broker::{BrokerConfig, BrokerRegistry};
use crate::error::ConfigurationError;
use crate::handler::Handler;
use crate::lifecycle::Resource;
use crate::schema::{MessageSchema, SchemaValidator};
use std::sync::Arc;

/// An immutable application definition.
///
/// Owned by the process; shared read-only across all workers. Each worker
/// gets its own lifecycle context and transport connection, but the broker
/// registry and binding registry are a single sealed snapshot.
pub struct Application {
    name: String,
    brokers: BrokerRegistry,
    bindings: Arc<BindingRegistry>,
    validator: SchemaValidator,
    resources: Vec<Arc<dyn Resource>>,
}

impl Application {
    /// Start declaring an application.
    ///
    /// The name doubles as the consumer group id, so every worker of the
    /// same application shares one group and the broker spreads partitions
    /// across them.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ApplicationBuilder {
        ApplicationBuilder {
            name: name.into(),
            brokers: BrokerRegistry::new(),
            bindings: BindingRegistry::new(),
            resources: Vec::new(),
            error: None,
        }
    }

    /// Application name and consumer group id.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared broker configurations.
    #[must_use]
    pub const fn brokers(&self) -> &BrokerRegistry {
        &self.brokers
    }

    /// The sealed binding registry.
    #[must_use]
    pub fn bindings(&self) -> Arc<BindingRegistry> {
        Arc::clone(&self.bindings)
    }

    /// The schema validator derived from the sealed bindings.
    #[must_use]
    pub const fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Declared lifecycle resources, in acquisition order.
    #[must_use]
    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.resources
    }
}

/// Collects declarations and seals them into an [`Application`].
///
/// Declaration errors (duplicate producer, empty declaration) are deferred:
/// the first one is stored and returned by [`ApplicationBuilder::build`],
/// keeping the fluent chain ergonomic while still refusing to start with a
/// broken declaration.
pub struct ApplicationBuilder {
    name: String,
    brokers: BrokerRegistry,
    bindings: BindingRegistry,
    resources: Vec<Arc<dyn Resource>>,
    error: Option<ConfigurationError>,
}

impl ApplicationBuilder {
    /// Register a broker configuration (last-write-wins by name).
    #[must_use]
    pub fn broker(mut self, config: BrokerConfig) -> Self {
        self.brokers.register(config);
        self
    }

    /// Declare a lifecycle resource; acquisition order is declaration order.
    #[must_use]
    pub fn resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Bind a consumer handler to a topic.
    #[must_use]
    pub fn consumer(
        mut self,
        topic: impl Into<String>,
        schema: MessageSchema,
        offset_reset: OffsetReset,
        handler: Arc<dyn Handler>,
    ) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.bindings.bind_consumer(topic, schema, offset_reset, handler) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Bind a producer schema to a topic.
    #[must_use]
    pub fn producer(mut self, topic: impl Into<String>, schema: MessageSchema) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.bindings.bind_producer(topic, schema) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Seal the declaration.
    ///
    /// # Errors
    ///
    /// Returns the first deferred declaration error, if any. All
    /// configuration errors are fatal at startup.
    pub fn build(self) -> Result<Application, ConfigurationError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.bindings.seal();
        let validator = SchemaValidator::from_bindings(&self.bindings);
        tracing::info!(
            app = %self.name,
            brokers = ?self.brokers.names(),
            resources = self.resources.len(),
            "application declaration sealed"
        );
        Ok(Application {
            name: self.name,
            brokers: self.brokers,
            bindings: Arc::new(self.bindings),
            validator,
            resources: self.resources,
        })
    }
}
