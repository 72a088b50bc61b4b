//! Supervisor actor: owns the worker actors of one process.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use broker::Broker;
use broker::repositories::JobRepository;
use chrono::{TimeDelta, Utc};
use futures_util::future::join_all;
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};

use crate::handler::HandlerRegistry;
use crate::messages::{ShutdownReport, SupervisorMessage, WorkerMessage};
use crate::settings::WorkerConfig;
use crate::stats::WorkerStats;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Supervisor actor arguments.
pub struct SupervisorArgs<S> {
    pub broker: Broker,
    pub functions: Arc<HandlerRegistry<S>>,
    pub state: Arc<S>,
    pub config: Arc<WorkerConfig>,
    pub stats: Arc<WorkerStats>,
}

struct WorkerSlot {
    worker_id: String,
    actor: ActorRef<WorkerMessage>,
    handle: JoinHandle<()>,
}

/// State for the supervisor actor.
pub struct SupervisorState<S> {
    args: SupervisorArgs<S>,
    /// Live workers by actor id.
    workers: HashMap<ActorId, WorkerSlot>,
    /// Prefix making worker ids unique across processes.
    node_tag: String,
    /// Worker counter for unique IDs.
    worker_counter: u64,
    shutting_down: bool,
    ticker: Option<tokio::task::JoinHandle<()>>,
}

impl<S> SupervisorState<S> {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}-{}", self.node_tag, self.worker_counter)
    }
}

async fn spawn_worker<S: Send + Sync + 'static>(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState<S>,
) -> Result<(), ActorProcessingErr> {
    let worker_id = state.next_worker_id();
    let args = WorkerArgs {
        worker_id: worker_id.clone(),
        broker: state.args.broker.clone(),
        functions: Arc::clone(&state.args.functions),
        state: Arc::clone(&state.args.state),
        config: Arc::clone(&state.args.config),
        stats: Arc::clone(&state.args.stats),
    };

    let (actor, handle) =
        Actor::spawn_linked(None, WorkerActor::<S>::new(), args, myself.get_cell())
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state.workers.insert(
        actor.get_id(),
        WorkerSlot {
            worker_id,
            actor,
            handle,
        },
    );
    Ok(())
}

/// Supervisor actor that keeps `max_jobs` workers alive.
pub struct Supervisor<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S> Supervisor<S> {
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
        }
    }
}

impl<S> Default for Supervisor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> Actor for Supervisor<S> {
    type Msg = SupervisorMessage;
    type State = SupervisorState<S>;
    type Arguments = SupervisorArgs<S>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let config = Arc::clone(&args.config);
        tracing::info!(
            "Starting worker supervisor: queue={} slots={}",
            config.queue_name,
            config.max_jobs
        );

        let tag = ulid::Ulid::new().to_string().to_lowercase();
        let mut state = SupervisorState {
            args,
            workers: HashMap::new(),
            node_tag: tag[tag.len().saturating_sub(8)..].to_string(),
            worker_counter: 0,
            shutting_down: false,
            ticker: None,
        };

        for _ in 0..config.max_jobs {
            spawn_worker(&myself, &mut state).await?;
        }

        // Start periodic tick
        let myself_clone = myself.clone();
        let period = config.health_check_interval;
        state.ticker = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        }));

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Tick => {
                if !state.shutting_down {
                    housekeeping(state).await;
                }
            }

            SupervisorMessage::Shutdown { reply } => {
                tracing::info!("Shutting down worker supervisor");
                state.shutting_down = true;
                if let Some(ticker) = state.ticker.take() {
                    ticker.abort();
                }

                let slots: Vec<WorkerSlot> = state.workers.drain().map(|(_, slot)| slot).collect();
                for slot in &slots {
                    slot.actor.stop(Some("shutdown".to_string()));
                }
                let actors: Vec<_> = slots.iter().map(|slot| slot.actor.clone()).collect();
                let handles = slots.into_iter().map(|slot| slot.handle);

                let grace = state.args.config.shutdown_grace;
                let graceful = tokio::time::timeout(grace, join_all(handles))
                    .await
                    .is_ok();

                let mut abandoned = 0;
                if !graceful {
                    abandoned = state.args.stats.snapshot().ongoing;
                    tracing::warn!(
                        "Workers still busy after {:?}, abandoning {} jobs to lease expiry",
                        grace,
                        abandoned
                    );
                    for actor in actors {
                        actor.kill();
                    }
                }

                let _ = reply.send(ShutdownReport {
                    graceful,
                    abandoned,
                });
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, reason) = match message {
            SupervisionEvent::ActorFailed(cell, err) => (cell, err.to_string()),
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                (cell, reason.unwrap_or_else(|| "stopped".to_string()))
            }
            _ => return Ok(()),
        };

        let Some(slot) = state.workers.remove(&cell.get_id()) else {
            return Ok(());
        };

        tracing::warn!("Worker {} terminated: {}", slot.worker_id, reason);
        if !state.shutting_down {
            spawn_worker(&myself, state).await?;
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }
}

/// Log worker health and drop terminal jobs past their retention.
async fn housekeeping<S>(state: &SupervisorState<S>) {
    let health = state.args.stats.snapshot();
    tracing::info!(
        "Worker health: complete={} failed={} ongoing={} workers={}",
        health.complete,
        health.failed,
        health.ongoing,
        state.workers.len()
    );

    let db = match state.args.broker.get() {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!("Skipping retention purge: {}", e);
            return;
        }
    };

    let keep = TimeDelta::from_std(state.args.config.keep_result).unwrap_or(TimeDelta::MAX);
    let Some(cutoff) = Utc::now().checked_sub_signed(keep) else {
        return;
    };

    match JobRepository::new(db).purge_finished(cutoff).await {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Purged {} finished jobs", removed),
        Err(e) => tracing::warn!("Retention purge failed: {}", e),
    }
}
