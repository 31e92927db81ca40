use crate::config::DatabaseConfig;
use crate::{DatabaseError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Owns the Postgres pool behind the ledger. Connects eagerly so a bad URL
/// fails at startup rather than on the first credit.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        info!(
            max_connections = config.max_connections,
            "ledger database pool ready"
        );
        Ok(Self { pool })
    }

    /// Apply any pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("ledger schema up to date");
        Ok(())
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    /// Drain the pool, waiting for in-flight queries to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
