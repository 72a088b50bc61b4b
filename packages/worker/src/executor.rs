//! Runs one claimed job through its handler.

use std::any::Any;
use std::sync::Arc;

use task_core::Job;
use tokio::task::AbortHandle;

use crate::error::ExecutionError;
use crate::handler::{HandlerRegistry, JobContext};
use crate::settings::WorkerConfig;

/// Aborts the handler task if the caller stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Execute `job` and return the value to store as its result.
///
/// The handler runs in its own task so that a panic is caught as a
/// `JoinError` instead of unwinding through the worker actor.
pub(crate) async fn execute<S: Send + Sync + 'static>(
    job: &Job,
    functions: &HandlerRegistry<S>,
    state: &Arc<S>,
    config: &WorkerConfig,
) -> Result<serde_json::Value, ExecutionError> {
    if job.attempts > config.max_tries {
        return Err(ExecutionError::MaxTriesExceeded {
            attempts: job.attempts,
        });
    }

    let handler = functions
        .get(&job.function)
        .ok_or_else(|| ExecutionError::HandlerNotFound(job.function.clone()))?;

    let ctx = JobContext {
        job_id: job.id.clone(),
        function: job.function.clone(),
        args: job.args.clone(),
        attempt: job.attempts,
        state: Arc::clone(state),
    };

    let task = tokio::spawn(handler.handle(ctx));
    let _guard = AbortOnDrop(task.abort_handle());

    match tokio::time::timeout(config.job_timeout, task).await {
        Err(_) => Err(ExecutionError::TimedOut(config.job_timeout)),
        Ok(Ok(result)) => result.map_err(ExecutionError::from),
        Ok(Err(e)) if e.is_panic() => Err(ExecutionError::Panicked(panic_message(e.into_panic()))),
        Ok(Err(_)) => Err(ExecutionError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::handler::HandlerError;

    fn registry() -> HandlerRegistry<()> {
        HandlerRegistry::new()
            .with_fn("echo", |ctx| async move { Ok(json!(ctx.args)) })
            .with_fn("fail", |_ctx| async move {
                Err(HandlerError::failed("document is corrupt"))
            })
            .with_fn("panic", |_ctx| async move {
                if true {
                    panic!("handler blew up");
                }
                Ok(json!(null))
            })
            .with_fn("slow", |_ctx| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
    }

    fn claimed(function: &str) -> Job {
        let mut job = Job::new("default", function, vec![json!("a")]);
        job.attempts = 1;
        job
    }

    async fn run(function: &str, config: &WorkerConfig) -> Result<serde_json::Value, ExecutionError> {
        execute(&claimed(function), &registry(), &Arc::new(()), config).await
    }

    #[tokio::test]
    async fn success_returns_handler_value() {
        let out = run("echo", &WorkerConfig::default()).await.unwrap();
        assert_eq!(out, json!(["a"]));
    }

    #[tokio::test]
    async fn handler_error_text_is_kept() {
        let err = run("fail", &WorkerConfig::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "document is corrupt");
    }

    #[tokio::test]
    async fn panic_is_caught() {
        let err = run("panic", &WorkerConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Panicked(ref msg) if msg.contains("handler blew up")));
    }

    #[tokio::test]
    async fn unknown_function_is_not_found() {
        let err = run("nope", &WorkerConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::HandlerNotFound(ref name) if name == "nope"));
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let config = WorkerConfig::default().with_job_timeout(Duration::from_millis(20));
        let err = run("slow", &config).await.unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut(_)));
    }

    #[tokio::test]
    async fn too_many_attempts_fail_without_running() {
        let config = WorkerConfig::default().with_max_tries(2);
        let mut job = claimed("echo");
        job.attempts = 3;
        let err = execute(&job, &registry(), &Arc::new(()), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::MaxTriesExceeded { attempts: 3 }));
    }
}
