//! Job handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use task_core::JobId;
use thiserror::Error;

/// Errors a handler reports for the job it was given.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Missing argument {0}")]
    MissingArgument(usize),
    #[error("Invalid argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Result type for job handlers.
pub type HandlerResult = Result<serde_json::Value, HandlerError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// What a handler gets to work with.
pub struct JobContext<S> {
    pub job_id: JobId,
    pub function: String,
    pub args: Vec<serde_json::Value>,
    /// Claim number, starting at 1.
    pub attempt: u32,
    /// Worker state built by the startup hook.
    pub state: Arc<S>,
}

impl<S> JobContext<S> {
    /// Deserialize positional argument `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        let value = self
            .args
            .get(index)
            .ok_or(HandlerError::MissingArgument(index))?;
        serde_json::from_value(value.clone()).map_err(|e| HandlerError::InvalidArgument {
            index,
            reason: e.to_string(),
        })
    }
}

/// Trait for job handlers.
///
/// Implement this trait to define how jobs of a specific function are
/// processed.
pub trait JobHandler<S>: Send + Sync + 'static {
    /// The function name this handler serves.
    fn name(&self) -> &str;

    /// Process a job and return its result.
    fn handle(&self, ctx: JobContext<S>) -> HandlerFuture;
}

/// Registry for job handlers, keyed by function name.
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, Arc<dyn JobHandler<S>>>,
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S: 'static> HandlerRegistry<S> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A later registration under the same name wins.
    pub fn register<H: JobHandler<S>>(&mut self, handler: H) {
        let name = handler.name().to_string();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!("Handler {} registered twice, keeping the last one", name);
        }
    }

    /// Register an async function under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(JobContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(FnHandler::new(name, move |ctx: JobContext<S>| {
            Box::pin(f(ctx)) as HandlerFuture
        }));
    }

    /// Builder form of [`register_fn`](Self::register_fn).
    pub fn with_fn<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JobContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_fn(name, f);
        self
    }

    /// Get the handler for a function.
    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler<S>>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// A function-based job handler.
pub struct FnHandler<F> {
    name: String,
    handler: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<S, F> JobHandler<S> for FnHandler<F>
where
    F: Fn(JobContext<S>) -> HandlerFuture + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ctx: JobContext<S>) -> HandlerFuture {
        (self.handler)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx(args: Vec<serde_json::Value>) -> JobContext<()> {
        JobContext {
            job_id: JobId::new(),
            function: "echo".into(),
            args,
            attempt: 1,
            state: Arc::new(()),
        }
    }

    #[test]
    fn args_are_typed() {
        let ctx = ctx(vec![json!("report.pdf"), json!(3)]);
        assert_eq!(ctx.arg::<String>(0).unwrap(), "report.pdf");
        assert_eq!(ctx.arg::<u32>(1).unwrap(), 3);
        assert!(matches!(
            ctx.arg::<String>(2),
            Err(HandlerError::MissingArgument(2))
        ));
        assert!(matches!(
            ctx.arg::<u32>(0),
            Err(HandlerError::InvalidArgument { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let registry = HandlerRegistry::<()>::new()
            .with_fn("echo", |ctx| async move { Ok(json!(ctx.args)) })
            .with_fn("fail", |_ctx| async move { Err(HandlerError::failed("nope")) });

        assert_eq!(registry.names(), vec!["echo", "fail"]);
        assert!(registry.get("missing").is_none());

        let echo = registry.get("echo").unwrap();
        let out = echo.handle(ctx(vec![json!(1)])).await.unwrap();
        assert_eq!(out, json!([1]));

        let fail = registry.get("fail").unwrap();
        let err = fail.handle(ctx(vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
