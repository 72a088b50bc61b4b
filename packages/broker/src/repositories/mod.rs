//! Repository implementations for broker operations.

mod job_repo;

pub use job_repo::JobRepository;
