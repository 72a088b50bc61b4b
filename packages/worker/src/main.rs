use broker::{Broker, BrokerConfig};
use storage::Storage;
use tracing_subscriber::EnvFilter;
use worker::{Worker, WorkerConfig, functions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::from_env();
    let broker = Broker::connect(&BrokerConfig::from_env()).await.map_err(|e| {
        tracing::error!("Could not connect to the broker: {}", e);
        e
    })?;
    let storage = Storage::from_env()?;

    let result = Worker::new(broker.clone(), functions::settings(config, storage))
        .run()
        .await;
    broker.close();

    let report = result?;
    if !report.graceful {
        tracing::warn!("{} jobs left to lease expiry", report.abandoned);
    }
    Ok(())
}
