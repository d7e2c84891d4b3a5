//! # Streambind Runtime
//!
//! The dispatch runtime and worker supervisor for the Streambind
//! topic-binding framework.
//!
//! A worker is one cooperative event loop over one broker connection:
//! it validates every inbound payload against the bound schema, invokes the
//! bound handlers in registration order with read-only access to the
//! worker's lifecycle resources, validates handler output against the
//! producer schema, and publishes. The supervisor runs N such workers in
//! isolation for horizontal throughput, leaving partition assignment to the
//! broker's consumer-group protocol.
//!
//! ## Fatality rules
//!
//! - Configuration and lifecycle failures abort startup (non-zero exit).
//! - Broker connect failures are retried with exponential backoff;
//!   exhaustion is fatal with the last cause.
//! - Per-message validation and handler failures are logged and skipped;
//!   they never alter the exit code.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use streambind_runtime::{LaunchOptions, launch};
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let app = Arc::new(build_app());
//!     let factory = Arc::new(KafkaTransportFactory::default());
//!     let options = LaunchOptions::from_args(std::env::args().skip(1))?;
//!     match launch(app, factory, options).await {
//!         Ok(()) => std::process::ExitCode::SUCCESS,
//!         Err(e) => {
//!             eprintln!("fatal: {e}");
//!             std::process::ExitCode::FAILURE
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod launch;
pub mod retry;
pub mod supervisor;
pub mod worker;

pub use error::{LaunchError, WorkerError};
pub use launch::{LaunchOptions, launch};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use supervisor::{DrainHandle, Supervisor};
pub use worker::{WorkerInstance, WorkerState};
