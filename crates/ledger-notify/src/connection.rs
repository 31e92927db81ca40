use crate::config::RedisConfig;
use crate::{NotifyError, Result};
use redis::aio::ConnectionManager;
use tracing::info;

/// Shared handle to the Redis server carrying the balance stream. The
/// [`ConnectionManager`] reconnects on its own, so clones of this handle stay
/// usable across broker restarts.
#[derive(Clone)]
pub struct RedisConnection {
    manager: ConnectionManager,
    config: RedisConfig,
}

impl RedisConnection {
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| NotifyError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| NotifyError::Connection(e.to_string()))?;
        info!(stream = %config.stream_key, "Redis balance stream connected");
        Ok(Self { manager, config })
    }

    /// Cheap clone of the underlying multiplexed connection.
    pub fn handle(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}
