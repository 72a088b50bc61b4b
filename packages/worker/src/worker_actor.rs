//! Worker actor: claims jobs from the broker and runs them one at a time.

use std::marker::PhantomData;
use std::sync::Arc;

use broker::repositories::JobRepository;
use broker::{Broker, DbError};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::executor::execute;
use crate::handler::HandlerRegistry;
use crate::messages::WorkerMessage;
use crate::settings::WorkerConfig;
use crate::stats::WorkerStats;

/// Worker actor arguments.
pub struct WorkerArgs<S> {
    pub worker_id: String,
    pub broker: Broker,
    pub functions: Arc<HandlerRegistry<S>>,
    pub state: Arc<S>,
    pub config: Arc<WorkerConfig>,
    pub stats: Arc<WorkerStats>,
}

/// State for the worker actor.
pub struct WorkerActorState<S> {
    /// Unique worker ID, recorded on every job this worker claims.
    pub worker_id: String,
    broker: Broker,
    functions: Arc<HandlerRegistry<S>>,
    state: Arc<S>,
    config: Arc<WorkerConfig>,
    stats: Arc<WorkerStats>,
    /// Jobs this worker has run.
    pub processed: u64,
}

impl<S> From<WorkerArgs<S>> for WorkerActorState<S> {
    fn from(args: WorkerArgs<S>) -> Self {
        Self {
            worker_id: args.worker_id,
            broker: args.broker,
            functions: args.functions,
            state: args.state,
            config: args.config,
            stats: args.stats,
            processed: 0,
        }
    }
}

impl<S: Send + Sync + 'static> WorkerActorState<S> {
    /// Claim one job and run it. Returns whether a job was processed.
    async fn poll_once(&mut self) -> Result<bool, DbError> {
        let repo = JobRepository::new(self.broker.get()?);

        let Some(job) = repo
            .claim(&self.config.queue_name, &self.worker_id, self.config.lease())
            .await?
        else {
            return Ok(false);
        };

        tracing::debug!(
            "Worker {} claimed job {} ({}), attempt {}",
            self.worker_id,
            job.id,
            job.function,
            job.attempts
        );

        let outcome = {
            let _ongoing = self.stats.track();
            execute(&job, &self.functions, &self.state, &self.config).await
        };
        self.processed += 1;
        self.stats.record(outcome.is_ok());

        let written = match outcome {
            Ok(result) => {
                tracing::debug!("Job {} complete", job.id);
                repo.complete(&job, result).await
            }
            Err(e) => {
                tracing::warn!("Job {} ({}) failed: {}", job.id, job.function, e);
                repo.fail(&job, e.to_string()).await
            }
        };

        match written {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(
                "Worker {} no longer owns job {}, outcome dropped",
                self.worker_id,
                job.id
            ),
            // The lease runs out and another claim picks the job up again.
            Err(e) => tracing::warn!("Failed to record outcome of job {}: {}", job.id, e),
        }

        Ok(true)
    }
}

/// Worker actor that executes jobs.
pub struct WorkerActor<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S> WorkerActor<S> {
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
        }
    }
}

impl<S> Default for WorkerActor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> Actor for WorkerActor<S> {
    type Msg = WorkerMessage;
    type State = WorkerActorState<S>;
    type Arguments = WorkerArgs<S>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        // Start the work loop
        myself.send_message(WorkerMessage::Poll)?;

        Ok(args.into())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => match state.poll_once().await {
                Ok(true) => {
                    myself.send_message(WorkerMessage::Poll)?;
                }
                Ok(false) => {
                    myself.send_after(state.config.poll_interval, || WorkerMessage::Poll);
                }
                Err(e) => {
                    tracing::warn!("Worker {} could not poll: {}", state.worker_id, e);
                    myself.send_after(state.config.poll_interval, || WorkerMessage::Poll);
                }
            },
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            "Worker {} stopped after {} jobs",
            state.worker_id,
            state.processed
        );
        Ok(())
    }
}
