//! Worker configuration and settings.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use broker::{Broker, DEFAULT_QUEUE_NAME};

use crate::error::WorkerError;
use crate::handler::HandlerRegistry;

/// Extra lease time past the job timeout before a running job may be
/// claimed again.
const LEASE_MARGIN: Duration = Duration::from_secs(30);

/// Runtime knobs of a worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Queue to claim jobs from.
    pub queue_name: String,
    /// Concurrent job slots, one worker actor each.
    pub max_jobs: usize,
    /// Idle delay between two claim attempts.
    pub poll_interval: Duration,
    /// Upper bound for one handler run.
    pub job_timeout: Duration,
    /// Claims allowed per job before it is failed outright.
    pub max_tries: u32,
    /// How long terminal jobs stay readable.
    pub keep_result: Duration,
    /// Period of the health log and retention purge.
    pub health_check_interval: Duration,
    /// Time in-flight jobs get to finish on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            max_jobs: 10,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(300),
            max_tries: 5,
            keep_result: Duration::from_secs(3600),
            health_check_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Build a config from environment variables.
    ///
    /// - `WORKER_QUEUE_NAME` (default: `default`)
    /// - `WORKER_MAX_JOBS` (default: `10`)
    /// - `WORKER_POLL_INTERVAL_MS` (default: `500`)
    /// - `WORKER_JOB_TIMEOUT_SECS` (default: `300`)
    /// - `WORKER_MAX_TRIES` (default: `5`)
    /// - `WORKER_KEEP_RESULT_SECS` (default: `3600`)
    /// - `WORKER_HEALTH_CHECK_SECS` (default: `60`)
    /// - `WORKER_SHUTDOWN_GRACE_SECS` (default: `10`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str, default: u64| -> u64 {
            match get(key) {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    tracing::warn!("Invalid value {key}={raw}, using {default}");
                    default
                }),
                None => default,
            }
        };
        let d = Self::default();

        Self {
            queue_name: get("WORKER_QUEUE_NAME").unwrap_or(d.queue_name),
            max_jobs: num("WORKER_MAX_JOBS", d.max_jobs as u64) as usize,
            poll_interval: Duration::from_millis(num(
                "WORKER_POLL_INTERVAL_MS",
                d.poll_interval.as_millis() as u64,
            )),
            job_timeout: Duration::from_secs(num(
                "WORKER_JOB_TIMEOUT_SECS",
                d.job_timeout.as_secs(),
            )),
            max_tries: u32::try_from(num("WORKER_MAX_TRIES", u64::from(d.max_tries)))
                .unwrap_or(d.max_tries),
            keep_result: Duration::from_secs(num(
                "WORKER_KEEP_RESULT_SECS",
                d.keep_result.as_secs(),
            )),
            health_check_interval: Duration::from_secs(num(
                "WORKER_HEALTH_CHECK_SECS",
                d.health_check_interval.as_secs(),
            )),
            shutdown_grace: Duration::from_secs(num(
                "WORKER_SHUTDOWN_GRACE_SECS",
                d.shutdown_grace.as_secs(),
            )),
        }
    }

    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn with_keep_result(mut self, keep: Duration) -> Self {
        self.keep_result = keep;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Lease taken on every claim.
    pub fn lease(&self) -> Duration {
        self.job_timeout.saturating_add(LEASE_MARGIN)
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.queue_name.trim().is_empty() {
            return Err(WorkerError::Config("queue name is empty".into()));
        }
        if self.max_jobs == 0 {
            return Err(WorkerError::Config("max_jobs must be at least 1".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(WorkerError::Config("poll interval must be positive".into()));
        }
        if self.job_timeout.is_zero() {
            return Err(WorkerError::Config("job timeout must be positive".into()));
        }
        if self.health_check_interval.is_zero() {
            return Err(WorkerError::Config(
                "health check interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub type StartupFuture<S> = Pin<Box<dyn Future<Output = Result<S, WorkerError>> + Send>>;
pub type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

type StartupHook<S> = Box<dyn FnOnce(Broker) -> StartupFuture<S> + Send>;
pub type ShutdownHook<S> = Box<dyn FnOnce(Arc<S>) -> ShutdownFuture + Send>;

/// Everything a worker needs: config, the function table and the hooks.
///
/// The startup hook builds the shared state `S` handed to every job; it runs
/// once before the first claim and its failure aborts the worker. The
/// shutdown hook receives that state back once the worker stopped.
pub struct WorkerSettings<S> {
    pub config: WorkerConfig,
    pub functions: HandlerRegistry<S>,
    pub(crate) on_startup: StartupHook<S>,
    pub(crate) on_shutdown: Option<ShutdownHook<S>>,
}

impl<S: Send + Sync + 'static> WorkerSettings<S> {
    pub fn new<F, Fut>(config: WorkerConfig, functions: HandlerRegistry<S>, on_startup: F) -> Self
    where
        F: FnOnce(Broker) -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, WorkerError>> + Send + 'static,
    {
        Self {
            config,
            functions,
            on_startup: Box::new(move |broker| Box::pin(on_startup(broker))),
            on_shutdown: None,
        }
    }

    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_shutdown = Some(Box::new(move |state| Box::pin(hook(state))));
        self
    }
}

impl WorkerSettings<()> {
    /// Settings without shared state.
    pub fn stateless(config: WorkerConfig, functions: HandlerRegistry<()>) -> Self {
        Self::new(config, functions, |_broker| async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = WorkerConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, WorkerConfig::default());
        assert_eq!(cfg.queue_name, "default");
        assert_eq!(cfg.max_jobs, 10);
        assert_eq!(cfg.keep_result, Duration::from_secs(3600));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let cfg = WorkerConfig::from_lookup(lookup(&[
            ("WORKER_QUEUE_NAME", "reports"),
            ("WORKER_MAX_JOBS", "2"),
            ("WORKER_POLL_INTERVAL_MS", "50"),
            ("WORKER_MAX_TRIES", "lots"),
        ]));
        assert_eq!(cfg.queue_name, "reports");
        assert_eq!(cfg.max_jobs, 2);
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.max_tries, 5);
    }

    #[test]
    fn lease_outlives_job_timeout() {
        let cfg = WorkerConfig::default().with_job_timeout(Duration::from_secs(1));
        assert!(cfg.lease() > cfg.job_timeout);
    }

    #[test]
    fn zero_slots_are_rejected() {
        let cfg = WorkerConfig::default().with_max_jobs(0);
        assert!(matches!(cfg.validate(), Err(WorkerError::Config(_))));
    }
}
