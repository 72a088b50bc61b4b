use broker::{Broker, BrokerConfig, DbError};

/// Connect a fresh in-memory broker. Every call gets its own datastore.
pub async fn setup_broker() -> Result<Broker, DbError> {
    Broker::connect(&BrokerConfig::memory()).await
}
