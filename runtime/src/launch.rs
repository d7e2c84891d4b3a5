//! The launch interface: run an application until shutdown.
//!
//! Binaries construct their [`Application`], pick a transport factory, and
//! hand both to [`launch`] together with options parsed from the command
//! line (`--workers N --broker NAME`). Exit behavior follows the error
//! taxonomy: clean shutdown returns `Ok` (exit 0), startup failures — bad
//! broker name, lifecycle setup failure, binding declaration errors —
//! return the fatal error for a non-zero exit. Per-message validation
//! failures are logged by the dispatch loop and never change the exit code.

use crate::error::LaunchError;
use crate::retry::RetryPolicy;
use crate::supervisor::Supervisor;
use std::sync::Arc;
use streambind_core::app::Application;
use streambind_core::error::ConfigurationError;
use streambind_core::transport::TransportFactory;

/// Options for [`launch`], usually parsed from CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Number of worker instances to spawn (positive).
    pub workers: usize,
    /// Name of the broker config to resolve as active.
    pub broker: String,
}

impl LaunchOptions {
    /// One worker against the named broker.
    #[must_use]
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            workers: 1,
            broker: broker.into(),
        }
    }

    /// Set the worker count.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Parse `--workers N --broker NAME` style arguments.
    ///
    /// The binary name is expected to be already stripped (pass
    /// `std::env::args().skip(1)`). `--broker` is required; `--workers`
    /// defaults to 1.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidWorkerCount`] for an unparseable or
    /// zero count, and an `UnknownBroker`-shaped error is left to the
    /// supervisor; a missing `--broker` or unknown flag fails here.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut workers = 1_usize;
        let mut broker: Option<String> = None;
        let mut iter = args.into_iter();
        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--workers" => {
                    let value = iter.next().unwrap_or_default();
                    workers = value.parse().map_err(|_| {
                        ConfigurationError::InvalidWorkerCount {
                            reason: format!("'{value}' is not a positive integer"),
                        }
                    })?;
                }
                "--broker" => {
                    broker = iter.next();
                }
                other => {
                    return Err(ConfigurationError::InvalidWorkerCount {
                        reason: format!("unknown launch flag '{other}'"),
                    });
                }
            }
        }
        if workers == 0 {
            return Err(ConfigurationError::InvalidWorkerCount {
                reason: "worker count must be positive".to_string(),
            });
        }
        let Some(broker) = broker else {
            return Err(ConfigurationError::UnknownBroker {
                name: "<missing --broker>".to_string(),
                known: Vec::new(),
            });
        };
        Ok(Self { workers, broker })
    }
}

/// Start the supervisor and run until ctrl-c or worker exit.
///
/// On ctrl-c the workers drain (in-flight handler invocations complete, no
/// new intake) and tear down before this returns.
///
/// # Errors
///
/// Any [`LaunchError`]: configuration failures before workers start, or
/// the first fatal worker fault.
pub async fn launch(
    app: Arc<Application>,
    factory: Arc<dyn TransportFactory>,
    options: LaunchOptions,
) -> Result<(), LaunchError> {
    let mut supervisor = Supervisor::start(
        options.workers,
        &options.broker,
        &app,
        &factory,
        RetryPolicy::default(),
    )?;

    let drain = supervisor.drain_handle();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            drain.signal();
        }
        outcome = supervisor.wait() => {
            // All workers exited on their own (fatal error or stream end).
            return outcome;
        }
    }

    supervisor.wait().await
}
