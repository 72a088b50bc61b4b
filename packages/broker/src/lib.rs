//! SurrealDB-backed job broker.
//!
//! This crate provides the broker connection handle, the job record store
//! shared by API and worker processes, and the queue client used to submit
//! and look up jobs.
//!
//! # Features
//!
//! - `memory` (default): embedded in-memory engine for tests
//! - `remote` (default): networked broker over WebSocket

mod connection;
mod queue;
mod schema;
pub mod repositories;

pub use connection::{Broker, BrokerConfig, Database, DbError};
pub use queue::{DEFAULT_QUEUE_NAME, EnqueueOptions, JobHandle, JobQueue, QueueError};
pub use schema::init_schema;
