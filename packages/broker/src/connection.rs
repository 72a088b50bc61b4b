//! Broker connection handle with explicit acquire and release.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;

use crate::schema::init_schema;

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Connection endpoint: "mem://" or "ws://host:port"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
    /// Extra connection attempts after the first one fails.
    pub conn_retries: u32,
    /// Delay before the first retry; doubled on every further attempt.
    pub conn_retry_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000".to_string(),
            namespace: "corpus".to_string(),
            database: "tasks".to_string(),
            credentials: None,
            conn_retries: 5,
            conn_retry_delay: Duration::from_secs(1),
        }
    }
}

impl BrokerConfig {
    /// Create a config for the embedded in-memory engine.
    pub fn memory() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            conn_retries: 0,
            ..Default::default()
        }
    }

    /// Create a config for a networked broker.
    pub fn remote(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("ws://{host}:{port}"),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `BROKER_ENDPOINT` (optional, wins over host/port, e.g. `mem://`)
    /// - `BROKER_HOST` (default: `localhost`), `BROKER_PORT` (default: `8000`)
    /// - `BROKER_NAMESPACE` (default: `corpus`), `BROKER_DATABASE` (default: `tasks`)
    /// - `BROKER_USERNAME`, `BROKER_PASSWORD` (optional, both required to sign in)
    /// - `BROKER_CONN_RETRIES` (default: `5`), `BROKER_CONN_RETRY_DELAY_MS` (default: `1000`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let defaults = Self::default();

        let endpoint = match get("BROKER_ENDPOINT") {
            Some(endpoint) => endpoint,
            None => {
                let host = get("BROKER_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = parse_or("BROKER_PORT", get("BROKER_PORT"), 8000u16);
                format!("ws://{host}:{port}")
            }
        };

        let credentials = match (get("BROKER_USERNAME"), get("BROKER_PASSWORD")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };

        Self {
            endpoint,
            namespace: get("BROKER_NAMESPACE").unwrap_or(defaults.namespace),
            database: get("BROKER_DATABASE").unwrap_or(defaults.database),
            credentials,
            conn_retries: parse_or(
                "BROKER_CONN_RETRIES",
                get("BROKER_CONN_RETRIES"),
                defaults.conn_retries,
            ),
            conn_retry_delay: Duration::from_millis(parse_or(
                "BROKER_CONN_RETRY_DELAY_MS",
                get("BROKER_CONN_RETRY_DELAY_MS"),
                defaults.conn_retry_delay.as_millis() as u64,
            )),
        }
    }
}

/// Broker errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Broker not initialized")]
    NotInitialized,
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Duplicate job id: {0}")]
    Duplicate(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl DbError {
    /// Whether the broker could not be reached at all, as opposed to
    /// rejecting the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DbError::NotInitialized
                | DbError::Connection(surrealdb::Error::Api(
                    surrealdb::error::Api::ConnectionUninitialised
                ))
        )
    }
}

/// Shared handle to the broker connection.
///
/// Cloning is cheap and every clone sees the same connection. The handle
/// starts empty, is filled by [`Broker::init`] at process start and emptied by
/// [`Broker::close`] at shutdown. Callers check it with [`Broker::get`] before
/// every use; an empty handle is a normal runtime condition.
#[derive(Clone, Default)]
pub struct Broker {
    conn: Arc<RwLock<Option<Database>>>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Broker {
    /// Create a handle with no connection.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Create a handle and connect it.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, DbError> {
        let broker = Self::disconnected();
        broker.init(config).await?;
        Ok(broker)
    }

    /// Connect, retrying with exponential backoff, and install the schema.
    ///
    /// Replaces any previous connection held by this handle.
    pub async fn init(&self, config: &BrokerConfig) -> Result<(), DbError> {
        let mut delay = config.conn_retry_delay;
        let mut attempt = 0u32;

        let db = loop {
            match open(config).await {
                Ok(db) => break db,
                Err(e) if attempt < config.conn_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Broker connection to {} failed ({}), retry {}/{} in {:?}",
                        config.endpoint,
                        e,
                        attempt,
                        config.conn_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e.into()),
            }
        };

        init_schema(&db).await?;

        *self.conn.write().unwrap_or_else(|e| e.into_inner()) = Some(db);
        Ok(())
    }

    /// Handle over an already built client.
    #[cfg(test)]
    pub(crate) fn from_client(db: Database) -> Self {
        Self {
            conn: Arc::new(RwLock::new(Some(db))),
        }
    }

    /// Get the connection, if one is held.
    pub fn get(&self) -> Result<Database, DbError> {
        self.conn
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DbError::NotInitialized)
    }

    /// Check whether a connection is held.
    pub fn is_connected(&self) -> bool {
        self.conn
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Drop the connection. Returns whether one was held.
    pub fn close(&self) -> bool {
        let released = self
            .conn
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();
        if released {
            tracing::info!("Broker connection released");
        }
        released
    }
}

async fn open(config: &BrokerConfig) -> Result<Database, surrealdb::Error> {
    tracing::info!("Connecting to broker: {}", config.endpoint);

    let db = connect(&config.endpoint).await?;

    // Authenticate if credentials provided
    if let Some((username, password)) = &config.credentials {
        db.signin(Root { username, password }).await?;
    }

    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to broker: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {key}={raw}, using {default}");
            default
        }),
        None => default,
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
    fn host_and_port_build_ws_endpoint() {
        let cfg = BrokerConfig::from_lookup(lookup(&[
            ("BROKER_HOST", "broker"),
            ("BROKER_PORT", "9000"),
        ]));
        assert_eq!(cfg.endpoint, "ws://broker:9000");
        assert_eq!(cfg.namespace, "corpus");
        assert!(cfg.credentials.is_none());
    }

    #[test]
    fn endpoint_overrides_host() {
        let cfg = BrokerConfig::from_lookup(lookup(&[
            ("BROKER_ENDPOINT", "mem://"),
            ("BROKER_HOST", "ignored"),
            ("BROKER_USERNAME", "root"),
            ("BROKER_PASSWORD", "secret"),
        ]));
        assert_eq!(cfg.endpoint, "mem://");
        assert_eq!(cfg.credentials, Some(("root".into(), "secret".into())));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let cfg = BrokerConfig::from_lookup(lookup(&[
            ("BROKER_PORT", "not-a-port"),
            ("BROKER_CONN_RETRIES", "-1"),
        ]));
        assert_eq!(cfg.endpoint, "ws://localhost:8000");
        assert_eq!(cfg.conn_retries, 5);
    }

    #[test]
    fn only_transport_errors_mean_unavailable() {
        assert!(DbError::NotInitialized.is_unavailable());
        assert!(
            DbError::from(surrealdb::Error::Api(
                surrealdb::error::Api::ConnectionUninitialised
            ))
            .is_unavailable()
        );
        assert!(!DbError::Duplicate("job-1".into()).is_unavailable());
        assert!(!DbError::Query("bad".into()).is_unavailable());
    }

    #[tokio::test]
    async fn handle_starts_empty_and_closes() -> Result<(), DbError> {
        let broker = Broker::disconnected();
        assert!(!broker.is_connected());
        assert!(matches!(broker.get(), Err(DbError::NotInitialized)));

        broker.init(&BrokerConfig::memory()).await?;
        let clone = broker.clone();
        assert!(clone.is_connected());

        assert!(broker.close());
        assert!(!clone.is_connected());
        assert!(!broker.close());
        Ok(())
    }
}
