//! Consumer handler abstraction and handler output routing.
//!
//! Handlers receive a validated [`TypedMessage`] plus the read-only
//! lifecycle context, and return zero or more [`OutboundMessage`]s destined
//! for producer-bound topics. The dispatch runtime validates each returned
//! message against the producer schema before anything is published.
//!
//! # Dyn Compatibility
//!
//! [`Handler`] uses an explicit `Pin<Box<dyn Future>>` return instead of
//! `async fn` so bindings can hold `Arc<dyn Handler>` trait objects. A
//! blanket implementation covers async closures, so most applications never
//! implement the trait by hand:
//!
//! ```
//! use std::sync::Arc;
//! use streambind_core::handler::{Handler, OutboundMessage, handler_fn};
//! use streambind_core::lifecycle::LifecycleContext;
//! use streambind_core::schema::TypedMessage;
//!
//! let echo = handler_fn(|message: TypedMessage, _ctx: Arc<LifecycleContext>| async move {
//!     Ok(vec![OutboundMessage::new("echoed", message)])
//! });
//! let _boxed: Arc<dyn Handler> = Arc::new(echo);
//! ```

use crate::lifecycle::LifecycleContext;
use crate::schema::TypedMessage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Failure of handler business logic for one message.
///
/// Handler failures are per-message: the dispatch runtime logs them and
/// moves on. One failing handler does not block other handlers bound to the
/// same topic, nor subsequent messages.
#[derive(Error, Debug, Clone)]
#[error("handler failed: {0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// A message a handler wants published, addressed to a producer topic.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Destination topic; must have a producer binding.
    pub topic: String,
    /// The message body, validated against the producer schema on publish.
    pub body: TypedMessage,
}

impl OutboundMessage {
    /// Address `body` to `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>, body: TypedMessage) -> Self {
        Self {
            topic: topic.into(),
            body,
        }
    }
}

/// Future returned by a handler invocation.
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Vec<OutboundMessage>, HandlerError>> + Send>>;

/// A consumer message handler.
///
/// Implementations must be `Send + Sync`: one worker invokes its handlers
/// sequentially, but the binding registry snapshot is shared across workers.
pub trait Handler: Send + Sync {
    /// Process one validated message.
    ///
    /// `resources` is the worker's lifecycle context, readable for the
    /// duration of the running phase.
    fn call(&self, message: TypedMessage, resources: Arc<LifecycleContext>) -> HandlerFuture;
}

/// Wrap an async closure as a [`Handler`].
pub const fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(TypedMessage, Arc<LifecycleContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<OutboundMessage>, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}

/// [`Handler`] implementation for async closures; see [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(TypedMessage, Arc<LifecycleContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<OutboundMessage>, HandlerError>> + Send + 'static,
{
    fn call(&self, message: TypedMessage, resources: Arc<LifecycleContext>) -> HandlerFuture {
        Box::pin((self.0)(message, resources))
    }
}
