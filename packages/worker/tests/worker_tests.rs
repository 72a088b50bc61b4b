#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use broker::JobQueue;
use bytes::Bytes;
use serde_json::json;
use storage::{Storage, StorageConfig};
use task_core::StatusLabel;
use worker::functions::{self, SAMPLE_BACKGROUND_TASK};
use worker::{HandlerError, HandlerRegistry, Worker, WorkerError, WorkerSettings};

const WAIT: Duration = Duration::from_secs(10);

fn demo_functions() -> HandlerRegistry<()> {
    HandlerRegistry::new()
        .with_fn("echo", |ctx| async move { Ok(json!({ "echo": ctx.args })) })
        .with_fn("fail", |_ctx| async move {
            Err(HandlerError::failed("intentional failure"))
        })
        .with_fn("panic", |_ctx| async move {
            if true {
                panic!("handler panicked on purpose");
            }
            Ok(json!(null))
        })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enqueued_job_completes() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());
    let worker = Worker::new(
        broker.clone(),
        WorkerSettings::stateless(common::fast_config(), demo_functions()),
    )
    .start()
    .await?;

    let handle = queue.enqueue("echo", vec![json!("hello")]).await?;
    let status = common::wait_for_terminal(&queue, handle.id(), WAIT).await?;
    assert_eq!(status, StatusLabel::Complete);

    let info = handle.info().await?.ok_or("job missing")?;
    assert_eq!(info.status.result(), Some(&json!({ "echo": ["hello"] })));
    assert_eq!(info.attempts, 1);

    // Terminal states stick.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status().await?, StatusLabel::Complete);

    let report = worker.shutdown().await?;
    assert!(report.graceful);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_and_panics_do_not_stop_the_worker() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());
    let worker = Worker::new(
        broker.clone(),
        WorkerSettings::stateless(common::fast_config().with_max_jobs(1), demo_functions()),
    )
    .start()
    .await?;

    let failing = queue.enqueue("fail", vec![]).await?;
    let panicking = queue.enqueue("panic", vec![]).await?;
    let missing = queue.enqueue("not_registered", vec![]).await?;

    for handle in [&failing, &panicking, &missing] {
        let status = common::wait_for_terminal(&queue, handle.id(), WAIT).await?;
        assert_eq!(status, StatusLabel::Failed);
    }

    let failing = failing.info().await?.ok_or("job missing")?;
    assert_eq!(failing.status.error(), Some("intentional failure"));

    let panicking = panicking.info().await?.ok_or("job missing")?;
    let error = panicking.status.error().ok_or("no error")?;
    assert!(error.contains("handler panicked on purpose"), "{error}");

    let missing = missing.info().await?.ok_or("job missing")?;
    let error = missing.status.error().ok_or("no error")?;
    assert!(error.contains("not_registered"), "{error}");

    // The single slot still serves normal jobs.
    let normal = queue.enqueue("echo", vec![json!(1)]).await?;
    let status = common::wait_for_terminal(&queue, normal.id(), WAIT).await?;
    assert_eq!(status, StatusLabel::Complete);

    let health = worker.health();
    assert_eq!(health.failed, 3);
    assert_eq!(health.complete, 1);

    worker.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn document_task_reports_on_stored_file() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());

    let storage = Storage::new(StorageConfig::memory())?;
    storage
        .put_bytes("report.pdf", Bytes::from_static(b"%PDF-1.7 test"))
        .await?;

    let worker = Worker::new(
        broker.clone(),
        functions::settings(common::fast_config(), storage),
    )
    .start()
    .await?;

    let handle = queue
        .enqueue(SAMPLE_BACKGROUND_TASK, vec![json!("report.pdf")])
        .await?;
    let first = handle.status().await?;
    assert!(
        matches!(
            first,
            StatusLabel::Queued | StatusLabel::Running | StatusLabel::Complete
        ),
        "{first}"
    );

    let status = common::wait_for_terminal(&queue, handle.id(), WAIT).await?;
    assert_eq!(status, StatusLabel::Complete);
    let info = handle.info().await?.ok_or("job missing")?;
    assert_eq!(
        info.status.result(),
        Some(&json!({
            "filename": "report.pdf",
            "size_bytes": 13,
            "message": "Task report.pdf is complete!",
        }))
    );

    let missing = queue
        .enqueue(SAMPLE_BACKGROUND_TASK, vec![json!("absent.pdf")])
        .await?;
    let status = common::wait_for_terminal(&queue, missing.id(), WAIT).await?;
    assert_eq!(status, StatusLabel::Failed);
    let info = missing.info().await?.ok_or("job missing")?;
    assert_eq!(info.status.error(), Some("Document absent.pdf not found"));

    worker.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_startup_hook_claims_nothing() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());
    let handle = queue.enqueue("echo", vec![]).await?;

    let settings = WorkerSettings::<()>::new(common::fast_config(), demo_functions(), |_| async {
        Err(WorkerError::Startup("storage offline".into()))
    });
    let err = Worker::new(broker.clone(), settings)
        .start()
        .await
        .err()
        .ok_or("expected startup failure")?;
    assert!(matches!(err, WorkerError::Startup(ref msg) if msg == "storage offline"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status().await?, StatusLabel::Queued);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_workers_run_each_job_once() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());

    let runs = Arc::new(AtomicU64::new(0));
    let make_settings = |runs: Arc<AtomicU64>| {
        let functions = HandlerRegistry::<AtomicU64>::new().with_fn("count", |ctx| async move {
            ctx.state.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(json!(null))
        });
        WorkerSettings::new(common::fast_config().with_max_jobs(3), functions, |_| async move {
            Ok(AtomicU64::new(0))
        })
        .on_shutdown(move |state| async move {
            runs.fetch_add(state.load(Ordering::SeqCst), Ordering::SeqCst);
        })
    };

    let a = Worker::new(broker.clone(), make_settings(Arc::clone(&runs)))
        .start()
        .await?;
    let b = Worker::new(broker.clone(), make_settings(Arc::clone(&runs)))
        .start()
        .await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        handles.push(queue.enqueue("count", vec![json!(i)]).await?);
    }
    for handle in &handles {
        let status = common::wait_for_terminal(&queue, handle.id(), WAIT).await?;
        assert_eq!(status, StatusLabel::Complete);
        let info = handle.info().await?.ok_or("job missing")?;
        assert_eq!(info.attempts, 1);
    }

    a.shutdown().await?;
    b.shutdown().await?;
    assert_eq!(runs.load(Ordering::SeqCst), 20);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_hook_receives_startup_state() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);

    let settings = WorkerSettings::new(
        common::fast_config(),
        HandlerRegistry::<String>::new(),
        |_| async { Ok("session".to_string()) },
    )
    .on_shutdown(move |state| async move {
        assert_eq!(state.as_str(), "session");
        flag.store(true, Ordering::SeqCst);
    });

    let worker = Worker::new(broker.clone(), settings).start().await?;
    assert_eq!(worker.state().as_str(), "session");
    worker.shutdown().await?;
    assert!(closed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_abandons_jobs_past_the_grace_period() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());
    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);

    let functions = HandlerRegistry::new().with_fn("sleepy", |_ctx| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!(null))
    });
    let config = common::fast_config()
        .with_max_jobs(1)
        .with_shutdown_grace(Duration::from_millis(200));
    let settings = WorkerSettings::stateless(config, functions).on_shutdown(move |_state| async move {
        flag.store(true, Ordering::SeqCst);
    });
    let worker = Worker::new(broker.clone(), settings).start().await?;

    let handle = queue.enqueue("sleepy", vec![]).await?;
    let deadline = tokio::time::Instant::now() + WAIT;
    while handle.status().await? != StatusLabel::Running {
        assert!(tokio::time::Instant::now() < deadline, "job never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = std::time::Instant::now();
    let report = worker.shutdown().await?;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!report.graceful);
    assert_eq!(report.abandoned, 1);
    assert!(closed.load(Ordering::SeqCst));

    // Left for another worker once the lease runs out.
    assert_eq!(handle.status().await?, StatusLabel::Running);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn finished_jobs_are_purged_after_retention() -> Result<(), Box<dyn Error>> {
    let broker = common::setup_broker().await?;
    let queue = JobQueue::new(broker.clone());
    let config = common::fast_config()
        .with_keep_result(Duration::ZERO)
        .with_health_check_interval(Duration::from_millis(50));
    let worker = Worker::new(
        broker.clone(),
        WorkerSettings::stateless(config, demo_functions()),
    )
    .start()
    .await?;

    let handle = queue.enqueue("echo", vec![]).await?;
    assert_eq!(
        common::wait_for_terminal(&queue, handle.id(), WAIT).await?,
        StatusLabel::Complete
    );
    assert_eq!(
        common::wait_for_not_found(&queue, handle.id(), WAIT).await?,
        StatusLabel::NotFound
    );

    worker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn disconnected_broker_is_rejected_at_start() -> Result<(), Box<dyn Error>> {
    let settings = WorkerSettings::stateless(common::fast_config(), demo_functions());
    let err = Worker::new(broker::Broker::disconnected(), settings)
        .start()
        .await
        .err()
        .ok_or("expected error")?;
    assert!(matches!(err, WorkerError::Broker(_)));
    Ok(())
}
