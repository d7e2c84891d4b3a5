//! Worker supervision: N isolated dispatch runtimes over one declaration.
//!
//! The supervisor resolves the active broker once, then spawns
//! `worker_count` independent [`WorkerInstance`]s. Each worker owns its
//! lifecycle context and transport connection; the only shared state is the
//! immutable binding registry snapshot. The supervisor never load-balances
//! messages itself — partition assignment across workers is the broker's
//! consumer-group protocol.
//!
//! Failure policy is fail-fast: a worker that exits with a fatal error is
//! logged and *not* restarted (restart is an orchestration concern outside
//! this runtime); the remaining workers keep running.

use crate::error::{LaunchError, WorkerError};
use crate::retry::RetryPolicy;
use crate::worker::WorkerInstance;
use std::sync::Arc;
use streambind_core::app::Application;
use streambind_core::error::ConfigurationError;
use streambind_core::transport::TransportFactory;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Clonable trigger for the supervisor's drain signal.
#[derive(Clone)]
pub struct DrainHandle {
    tx: broadcast::Sender<()>,
}

impl DrainHandle {
    /// Ask every worker to drain and stop.
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }
}

/// Handle over a set of spawned workers.
pub struct Supervisor {
    drain_tx: broadcast::Sender<()>,
    workers: JoinSet<(usize, Result<(), WorkerError>)>,
    worker_count: usize,
}

impl Supervisor {
    /// Resolve the broker and spawn `worker_count` workers.
    ///
    /// Every worker resolves the same broker config and shares the same
    /// sealed bindings; nothing mutable is shared between them.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidWorkerCount`] for a zero count and
    /// [`ConfigurationError::UnknownBroker`] when `broker_name` is not
    /// registered — both fatal before any worker starts.
    pub fn start(
        worker_count: usize,
        broker_name: &str,
        app: &Arc<Application>,
        factory: &Arc<dyn TransportFactory>,
        retry: RetryPolicy,
    ) -> Result<Self, LaunchError> {
        if worker_count == 0 {
            return Err(ConfigurationError::InvalidWorkerCount {
                reason: "worker count must be positive".to_string(),
            }
            .into());
        }
        let broker = app.brokers().resolve(broker_name)?.clone();
        tracing::info!(
            app = app.name(),
            broker = %broker.name,
            bootstrap = %broker.bootstrap(),
            workers = worker_count,
            "starting workers"
        );

        let (drain_tx, _) = broadcast::channel(1);
        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let worker = WorkerInstance::new(id, app, broker.clone(), Arc::clone(factory))
                .with_retry_policy(retry.clone());
            let drain = drain_tx.subscribe();
            workers.spawn(async move { (id, worker.run(drain).await) });
        }

        Ok(Self {
            drain_tx,
            workers,
            worker_count,
        })
    }

    /// Number of workers spawned.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Signal every worker to drain: finish in-flight work, take no new
    /// messages, tear down.
    pub fn shutdown(&self) {
        tracing::info!("drain signal sent to all workers");
        // Send fails only when every worker already exited.
        let _ = self.drain_tx.send(());
    }

    /// A detachable handle that can trigger the drain signal.
    ///
    /// Lets a signal listener request shutdown while [`Supervisor::wait`]
    /// holds the supervisor itself.
    #[must_use]
    pub fn drain_handle(&self) -> DrainHandle {
        DrainHandle {
            tx: self.drain_tx.clone(),
        }
    }

    /// Wait for every worker to finish.
    ///
    /// Worker outcomes are logged as they arrive. Returns the first fatal
    /// worker error (if any) after all workers have exited.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Worker`] wrapping the first fatal worker fault.
    pub async fn wait(&mut self) -> Result<(), LaunchError> {
        let mut first_failure: Option<LaunchError> = None;
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok((worker_id, Ok(()))) => {
                    tracing::info!(worker = worker_id, "worker exited cleanly");
                }
                Ok((worker_id, Err(source))) => {
                    tracing::error!(worker = worker_id, error = %source, "worker failed (not restarted)");
                    if first_failure.is_none() {
                        first_failure = Some(LaunchError::Worker { worker_id, source });
                    }
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "worker task aborted");
                }
            }
        }
        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
