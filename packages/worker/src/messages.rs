//! Message types for actor communication.

use ractor::RpcReplyPort;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Try to claim and run one job.
    Poll,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Periodic housekeeping: health log and retention purge.
    Tick,

    /// Stop all workers, waiting up to the grace period for in-flight jobs.
    Shutdown { reply: RpcReplyPort<ShutdownReport> },
}

/// Outcome of a supervisor shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every worker stopped within the grace period.
    pub graceful: bool,
    /// Jobs still running when the grace period ran out.
    pub abandoned: u64,
}
