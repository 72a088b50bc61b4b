//! Core domain types for the task system.
//!
//! This crate contains the job record shared by the API, the broker client
//! and the worker process:
//! - `Job` and `JobStatus` for the stored record
//! - `StatusLabel` for status lookups, including `NotFound`

mod job;

pub use job::{InvalidJobId, Job, JobId, JobStatus, StatusLabel};

/// Function that processes one stored document.
///
/// The API enqueues it and the worker serves it, so both sides share the name.
pub const SAMPLE_BACKGROUND_TASK: &str = "sample_background_task";
