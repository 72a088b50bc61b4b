use api::{ApiConfig, AppState, build_router};
use broker::{Broker, BrokerConfig};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env()?;

    // Serve even without a broker: task routes answer 503 until restart.
    let broker = Broker::disconnected();
    if let Err(e) = broker.init(&BrokerConfig::from_env()).await {
        tracing::warn!("Broker unavailable, task routes will answer 503: {}", e);
    }

    let storage = match Storage::from_env() {
        Ok(storage) => Some(storage),
        Err(e) => {
            tracing::warn!("Document storage disabled: {}", e);
            None
        }
    };

    let corpus = match &config.search {
        Some(search_config) => match search::connect(search_config) {
            Ok(corpus) => Some(corpus),
            Err(e) => {
                tracing::warn!("Search disabled: {}", e);
                None
            }
        },
        None => {
            tracing::info!("SEARCH_URL not set, search routes disabled");
            None
        }
    };

    let state = AppState::from_config(&config, broker.clone(), corpus, storage);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    broker.close();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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

    tracing::info!("Shutdown signal received");
}
