//! # Streambind Core
//!
//! Core traits and types for the Streambind declarative topic-binding
//! framework.
//!
//! Streambind lets an application register typed message handlers against
//! broker topics, validates every payload against an explicit schema before
//! handler code runs, and manages shared resources with a scoped
//! setup/teardown lifecycle. The broker itself (Kafka or compatible) is an
//! external collaborator reached through the [`transport`] seam.
//!
//! ## Flow
//!
//! ```text
//! ┌────────────────┐   resolve(name)   ┌────────────────┐
//! │ BrokerRegistry │──────────────────►│   Supervisor   │
//! └────────────────┘                   └───────┬────────┘
//!                                              │ spawns N workers
//!                                              ▼
//!                                      ┌────────────────┐
//!   LifecycleManager::enter() ────────►│ WorkerInstance │
//!                                      └───────┬────────┘
//!                   inbound msg               │
//!   SchemaValidator ──────────────► handlers (registration order)
//!                   outbound msg              │
//!   SchemaValidator ──────────────► producer bindings ──► broker
//! ```
//!
//! ## Crates
//!
//! - `streambind-core` (this crate) — declaration surface and contracts
//! - `streambind-runtime` — dispatch loop, worker supervisor, launch
//! - `streambind-kafka` — rdkafka-backed transport
//! - `streambind-testing` — in-memory transport and lifecycle probes

pub mod app;
pub mod bindings;
pub mod broker;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod schema;
pub mod transport;

pub use app::{Application, ApplicationBuilder};
pub use bindings::{BindingRegistry, OffsetReset};
pub use broker::{BrokerConfig, BrokerRegistry, TransportSecurity};
pub use error::{ConfigurationError, LifecycleError, TransportError, ValidationError};
pub use handler::{Handler, HandlerError, OutboundMessage, handler_fn};
pub use lifecycle::{LifecycleContext, LifecycleManager, Resource};
pub use schema::{Constraint, FieldType, MessageSchema, SchemaValidator, TypedMessage};
pub use transport::{InboundMessage, MessageStream, MessageTransport, TransportFactory};
