//! Worker process for the job broker.
//!
//! This crate provides the function table, the Ractor-based actors that
//! claim and execute jobs, and the process lifecycle around them.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor; keeps `max_jobs` workers alive, runs
//!   the health log and the retention purge
//! - `WorkerActor` - Claims jobs from the broker and runs them
//! - `Worker` / `WorkerHandle` - Startup hook, supervisor start, graceful stop
//!
//! # Usage
//!
//! ```ignore
//! use worker::{HandlerRegistry, Worker, WorkerConfig, WorkerSettings};
//!
//! let functions = HandlerRegistry::new()
//!     .with_fn("echo", |ctx| async move { Ok(serde_json::json!(ctx.args)) });
//! let settings = WorkerSettings::stateless(WorkerConfig::from_env(), functions);
//! Worker::new(broker, settings).run().await?;
//! ```

mod error;
mod executor;
pub mod functions;
mod handler;
mod messages;
mod settings;
mod stats;
mod supervisor;
mod worker;
mod worker_actor;

pub use error::{ExecutionError, WorkerError};
pub use handler::{
    FnHandler, HandlerError, HandlerFuture, HandlerRegistry, HandlerResult, JobContext,
    JobHandler,
};
pub use messages::{ShutdownReport, SupervisorMessage, WorkerMessage};
pub use settings::{ShutdownFuture, ShutdownHook, StartupFuture, WorkerConfig, WorkerSettings};
pub use stats::HealthSnapshot;
pub use supervisor::Supervisor;
pub use worker::{Worker, WorkerHandle, shutdown_signal};
pub use worker_actor::WorkerActor;
