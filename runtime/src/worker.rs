//! The per-worker dispatch loop.
//!
//! Each [`WorkerInstance`] is one isolated copy of the runtime: its own
//! lifecycle context, its own transport connection, one cooperative event
//! loop. It moves through `Stopped → Starting → Running → Draining →
//! Stopped`:
//!
//! - `Starting` — lifecycle `enter()` runs (failure is fatal, not retried),
//!   the transport connects with exponential backoff, and one subscription
//!   stream is opened per offset-policy group.
//! - `Running` — every inbound message is schema-validated; valid messages
//!   are handed to each bound handler in registration order; handler output
//!   is validated against the producer schema and published. Rejected
//!   messages are logged and skipped — one bad payload never stalls the
//!   partition or crashes the worker.
//! - `Draining` — the drain signal stops intake; the in-flight handler
//!   invocation completes before teardown.
//! - `Stopped` — lifecycle `exit()` releases resources in reverse order and
//!   the connection is dropped.

use crate::error::WorkerError;
use crate::retry::{RetryPolicy, retry_with_backoff};
use futures::StreamExt;
use futures::stream::SelectAll;
use std::sync::Arc;
use streambind_core::app::Application;
use streambind_core::bindings::BindingRegistry;
use streambind_core::broker::BrokerConfig;
use streambind_core::handler::OutboundMessage;
use streambind_core::lifecycle::{LifecycleContext, LifecycleManager};
use streambind_core::schema::SchemaValidator;
use streambind_core::transport::{InboundMessage, MessageTransport, TransportFactory};
use tokio::sync::broadcast;

/// Dispatch runtime state, per worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not yet started, or fully torn down.
    Stopped,
    /// Acquiring resources, connecting, subscribing.
    Starting,
    /// Consuming and dispatching messages.
    Running,
    /// Shutdown signalled; finishing in-flight work, no new intake.
    Draining,
}

/// One running copy of the dispatch runtime.
///
/// Created by the supervisor; owns its lifecycle manager and transport
/// connection exclusively. The binding registry snapshot and validator are
/// shared read-only with the other workers.
pub struct WorkerInstance {
    id: usize,
    group_id: String,
    bindings: Arc<BindingRegistry>,
    validator: SchemaValidator,
    broker: BrokerConfig,
    factory: Arc<dyn TransportFactory>,
    lifecycle: LifecycleManager,
    retry: RetryPolicy,
    state: WorkerState,
}

impl WorkerInstance {
    /// Build a worker against a resolved broker config.
    #[must_use]
    pub fn new(
        id: usize,
        app: &Application,
        broker: BrokerConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            id,
            group_id: app.name().to_string(),
            bindings: app.bindings(),
            validator: app.validator().clone(),
            broker,
            factory,
            lifecycle: LifecycleManager::new(app.resources().to_vec()),
            retry: RetryPolicy::default(),
            state: WorkerState::Stopped,
        }
    }

    /// Override the connect retry policy (tests use short delays).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current state of the dispatch state machine.
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// Drive the worker until the drain signal fires or a fatal error
    /// occurs.
    ///
    /// Teardown is unconditional: however `Starting` or `Running` end,
    /// every acquired lifecycle resource is released before this returns.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Lifecycle`] when resource setup fails (fatal, not
    /// retried) and [`WorkerError::Transport`] when the broker stays
    /// unreachable after the retry policy is exhausted.
    pub async fn run(mut self, drain: broadcast::Receiver<()>) -> Result<(), WorkerError> {
        let outcome = self.start_and_dispatch(drain).await;

        // Stopped: teardown runs whether startup or dispatch failed.
        self.transition(WorkerState::Stopped);
        self.lifecycle.exit().await;

        if outcome.is_ok() {
            tracing::info!(worker = self.id, "worker stopped cleanly");
        }
        outcome
    }

    async fn start_and_dispatch(
        &mut self,
        mut drain: broadcast::Receiver<()>,
    ) -> Result<(), WorkerError> {
        self.transition(WorkerState::Starting);

        let context = self.lifecycle.enter().await?;

        let factory = Arc::clone(&self.factory);
        let broker = self.broker.clone();
        let transport = retry_with_backoff(&self.retry, "broker connect", || {
            factory.connect(&broker)
        })
        .await?;

        let mut inbound: SelectAll<_> = SelectAll::new();
        for group in self.bindings.subscription_groups() {
            let stream = transport
                .subscribe(&group.topics, group.offset_reset, &self.group_id)
                .await?;
            tracing::debug!(
                worker = self.id,
                topics = ?group.topics,
                offset_reset = group.offset_reset.as_str(),
                "subscribed"
            );
            inbound.push(stream);
        }
        if inbound.is_empty() {
            // No consumer bindings: stay idle until the drain signal
            // instead of treating the empty set as an ended stream.
            inbound.push(Box::pin(futures::stream::pending()));
        }

        self.transition(WorkerState::Running);
        loop {
            tokio::select! {
                _ = drain.recv() => {
                    self.transition(WorkerState::Draining);
                    break;
                }
                next = inbound.next() => match next {
                    Some(Ok(message)) => {
                        self.dispatch(message, &context, transport.as_ref()).await;
                    }
                    Some(Err(e)) => {
                        // Broker-side receive errors are surfaced but do not
                        // stop the loop; the consumer keeps polling.
                        tracing::warn!(worker = self.id, error = %e, "receive error");
                    }
                    None => {
                        tracing::info!(worker = self.id, "inbound stream ended");
                        self.transition(WorkerState::Draining);
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    /// Validate one message and fan it out to every bound handler.
    ///
    /// Per-message failures (schema rejection, handler error, unbound or
    /// invalid output) are logged and skipped; nothing here is allowed to
    /// escape as a worker fault.
    async fn dispatch(
        &self,
        message: InboundMessage,
        context: &Arc<LifecycleContext>,
        transport: &dyn MessageTransport,
    ) {
        let typed = match self.validator.validate_inbound(&message.topic, &message.payload) {
            Ok(typed) => typed,
            Err(e) => {
                tracing::warn!(
                    worker = self.id,
                    topic = %message.topic,
                    error = %e,
                    "inbound message rejected"
                );
                return;
            }
        };

        // Handlers run in registration order; one handler's failure does
        // not block the others bound to the same topic.
        for binding in self.bindings.resolve_consumers(&message.topic) {
            match binding.handler.call(typed.clone(), Arc::clone(context)).await {
                Ok(outbound) => {
                    for out in outbound {
                        self.publish(out, transport).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        worker = self.id,
                        topic = %message.topic,
                        error = %e,
                        "handler failed"
                    );
                }
            }
        }
    }

    /// Route one handler-produced message through its producer binding.
    ///
    /// Output is re-validated before publish even though the handler
    /// produced it; an unregistered destination surfaces `UnboundProducer`
    /// and nothing is sent.
    async fn publish(&self, out: OutboundMessage, transport: &dyn MessageTransport) {
        if let Err(e) = self.bindings.resolve_producer(&out.topic) {
            tracing::error!(worker = self.id, topic = %out.topic, error = %e, "publish dropped");
            return;
        }
        let payload = match self.validator.validate_outbound(&out.topic, &out.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    worker = self.id,
                    topic = %out.topic,
                    error = %e,
                    "outbound message rejected"
                );
                return;
            }
        };
        if let Err(e) = transport.publish(&out.topic, payload).await {
            tracing::error!(worker = self.id, topic = %out.topic, error = %e, "publish failed");
        }
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::debug!(worker = self.id, from = ?self.state, to = ?next, "worker state change");
        self.state = next;
    }
}
