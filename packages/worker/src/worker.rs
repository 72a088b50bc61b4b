//! Worker process lifecycle: startup hook, supervisor, graceful stop.

use std::sync::Arc;

use broker::{Broker, DbError};
use ractor::{Actor, ActorRef};

use crate::error::WorkerError;
use crate::messages::{ShutdownReport, SupervisorMessage};
use crate::settings::{ShutdownHook, WorkerSettings};
use crate::stats::{HealthSnapshot, WorkerStats};
use crate::supervisor::{Supervisor, SupervisorArgs};

/// A worker process bound to one broker.
pub struct Worker<S> {
    broker: Broker,
    settings: WorkerSettings<S>,
}

impl<S: Send + Sync + 'static> Worker<S> {
    pub fn new(broker: Broker, settings: WorkerSettings<S>) -> Self {
        Self { broker, settings }
    }

    /// Run the startup hook and start the worker actors.
    ///
    /// Nothing is claimed if the hook fails.
    pub async fn start(self) -> Result<WorkerHandle<S>, WorkerError> {
        let WorkerSettings {
            config,
            functions,
            on_startup,
            on_shutdown,
        } = self.settings;

        config.validate()?;
        if !self.broker.is_connected() {
            return Err(DbError::NotInitialized.into());
        }

        tracing::info!(
            "Starting worker for queue {} with functions {:?}",
            config.queue_name,
            functions.names()
        );

        let state = on_startup(self.broker.clone()).await.map_err(|e| {
            tracing::error!("Worker startup hook failed: {}", e);
            match e {
                WorkerError::Startup(msg) => WorkerError::Startup(msg),
                other => WorkerError::Startup(other.to_string()),
            }
        })?;
        let state = Arc::new(state);
        let stats = Arc::new(WorkerStats::default());

        let args = SupervisorArgs {
            broker: self.broker.clone(),
            functions: Arc::new(functions),
            state: Arc::clone(&state),
            config: Arc::new(config),
            stats: Arc::clone(&stats),
        };
        let (supervisor, join) = Actor::spawn(None, Supervisor::<S>::new(), args).await?;

        Ok(WorkerHandle {
            supervisor,
            join,
            state,
            stats,
            on_shutdown,
        })
    }

    /// Start, then run until Ctrl-C or SIGTERM and stop gracefully.
    pub async fn run(self) -> Result<ShutdownReport, WorkerError> {
        let handle = self.start().await?;
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        handle.shutdown().await
    }
}

/// Handle to a running worker.
pub struct WorkerHandle<S> {
    supervisor: ActorRef<SupervisorMessage>,
    join: ractor::concurrency::JoinHandle<()>,
    state: Arc<S>,
    stats: Arc<WorkerStats>,
    on_shutdown: Option<ShutdownHook<S>>,
}

impl<S: Send + Sync + 'static> WorkerHandle<S> {
    /// State built by the startup hook.
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Job counters of this process.
    pub fn health(&self) -> HealthSnapshot {
        self.stats.snapshot()
    }

    /// Stop all workers, then run the shutdown hook.
    ///
    /// Jobs that outlive the grace period stay `Running` in the broker until
    /// their lease expires and another worker claims them. The hook runs even
    /// when the supervisor is already gone.
    pub async fn shutdown(self) -> Result<ShutdownReport, WorkerError> {
        let WorkerHandle {
            supervisor,
            join,
            state,
            stats,
            on_shutdown,
        } = self;

        let stopped = stop_supervisor(&supervisor, join).await;

        if let Some(hook) = on_shutdown {
            hook(Arc::clone(&state)).await;
        }

        let report = stopped?;
        let health = stats.snapshot();
        tracing::info!(
            "Worker stopped: complete={} failed={} abandoned={}",
            health.complete,
            health.failed,
            report.abandoned
        );
        Ok(report)
    }
}

async fn stop_supervisor(
    supervisor: &ActorRef<SupervisorMessage>,
    join: ractor::concurrency::JoinHandle<()>,
) -> Result<ShutdownReport, WorkerError> {
    let (tx, rx) = ractor::concurrency::oneshot();
    let sent = supervisor.send_message(SupervisorMessage::Shutdown { reply: tx.into() });
    let report = match sent {
        Ok(()) => rx
            .await
            .map_err(|_| WorkerError::Actor("supervisor dropped shutdown reply".into())),
        Err(e) => Err(WorkerError::Actor(e.to_string())),
    };

    if let Err(e) = join.await {
        tracing::warn!("Supervisor task ended abnormally: {}", e);
    }
    report
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use broker::BrokerConfig;

    use super::*;
    use crate::handler::HandlerRegistry;
    use crate::settings::WorkerConfig;

    #[tokio::test]
    async fn shutdown_hook_runs_when_supervisor_is_gone() {
        let broker = Broker::connect(&BrokerConfig::memory()).await.unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let settings = WorkerSettings::stateless(
            WorkerConfig::default().with_max_jobs(1),
            HandlerRegistry::new(),
        )
        .on_shutdown(move |_state| async move {
            flag.store(true, Ordering::SeqCst);
        });

        let handle = Worker::new(broker, settings).start().await.unwrap();
        handle.supervisor.kill();

        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, WorkerError::Actor(_)));
        assert!(ran.load(Ordering::SeqCst));
    }
}
