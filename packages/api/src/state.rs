//! Shared handler state.

use std::sync::Arc;

use broker::{Broker, JobQueue};
use search::Corpus;
use storage::Storage;

use crate::config::ApiConfig;
use crate::rate_limit::{MemoryRateLimiter, NoRateLimit, RateLimiter};

/// State injected into every handler.
///
/// The broker handle inside `queue` is owned by the process; a disconnected
/// broker makes the task routes answer 503.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub corpus: Option<Corpus>,
    pub storage: Option<Storage>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// Task routes only: no search, no storage, no rate limit.
    pub fn new(queue: JobQueue) -> Self {
        Self {
            queue,
            corpus: None,
            storage: None,
            rate_limiter: Arc::new(NoRateLimit),
        }
    }

    /// State for a configured API process.
    pub fn from_config(
        config: &ApiConfig,
        broker: Broker,
        corpus: Option<Corpus>,
        storage: Option<Storage>,
    ) -> Self {
        Self {
            queue: JobQueue::new(broker).with_queue_name(&config.queue_name),
            corpus,
            storage,
            rate_limiter: Arc::new(MemoryRateLimiter::new(config.rate_limit)),
        }
    }

    pub fn with_corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: impl RateLimiter + 'static) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    pub fn broker(&self) -> &Broker {
        self.queue.broker()
    }
}
