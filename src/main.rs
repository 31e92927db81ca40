use ledger_api::{ApiConfig, ApiServer, AppContext};
use ledger_core::config::RewardsConfig;
use ledger_core::notify::{BalanceNotifier, NoopNotifier};
use ledger_core::storage::LedgerStore;
use ledger_db::{DatabaseConfig, DatabasePool, PgLedgerStore};
use ledger_engine::{
    AgentTierEngine, CommissionCascadeProcessor, EarningsLedger, RewardEngine, WeeklyBonusRunner,
    WithdrawalEligibilityGuard, WithdrawalProcessor,
};
use ledger_notify::{RedisConfig, RedisConnection, RedisNotifier, RedisPublisher};
use ledger_store::MemoryLedgerStore;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("ledger_engine=info".parse()?)
                .add_directive("ledger_api=info".parse()?),
        )
        .init();

    info!("Rewards ledger starting...");

    // Rate tables and limits (validates the tier ordering)
    let config = match RewardsConfig::load().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => {
            info!(
                currency = %config.currency,
                tiers = config.agent_tiers.len(),
                weekly_limit = config.withdrawal_limits.weekly,
                "Rewards configuration loaded"
            );
            Arc::new(config)
        }
        Err(e) => {
            error!(error = %e, "Failed to load rewards configuration");
            std::process::exit(1);
        }
    };

    // Storage backend (Postgres if DATABASE_URL is set, in-memory otherwise)
    let (store, db_pool): (Arc<dyn LedgerStore>, Option<DatabasePool>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let db_config = DatabaseConfig::from_env(url);
                match DatabasePool::connect(&db_config).await {
                    Ok(pool) => {
                        if let Err(e) = pool.migrate().await {
                            error!(error = %e, "Failed to run database migrations");
                            std::process::exit(1);
                        }
                        info!("Database connected and migrations applied");
                        (
                            Arc::new(PgLedgerStore::new(pool.clone(), config.currency.clone())),
                            Some(pool),
                        )
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to connect to database");
                        std::process::exit(1);
                    }
                }
            }
            Err(_) => {
                warn!("DATABASE_URL not set, running without persistence");
                (
                    Arc::new(MemoryLedgerStore::new(config.currency.clone())),
                    None,
                )
            }
        };

    // Balance notifications (Redis if REDIS_URL is set)
    let notifier: Arc<dyn BalanceNotifier> = match std::env::var("REDIS_URL") {
        Ok(url) => {
            let redis_config = RedisConfig::from_env(url);
            match RedisConnection::connect(redis_config).await {
                Ok(conn) => {
                    let publisher = RedisPublisher::new(Arc::new(conn));
                    info!("Redis connected for balance streaming");
                    Arc::new(RedisNotifier::new(publisher))
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to Redis");
                    std::process::exit(1);
                }
            }
        }
        Err(_) => {
            warn!("REDIS_URL not set, running without balance streaming");
            Arc::new(NoopNotifier)
        }
    };

    // Engine components share the store and config
    let ledger = Arc::new(EarningsLedger::new(store.clone(), notifier));
    let tiers = AgentTierEngine::new(store.clone(), config.clone());
    let rewards = RewardEngine::new(ledger.clone(), config.clone());
    let cascade = CommissionCascadeProcessor::new(ledger.clone(), tiers.clone(), config.clone());
    let guard = WithdrawalEligibilityGuard::new(store.clone(), config.clone());
    let withdrawals = WithdrawalProcessor::new(ledger.clone(), guard, tiers.clone(), config.clone());
    let weekly = WeeklyBonusRunner::new(ledger.clone(), tiers, config.clone());

    let ctx = AppContext {
        ledger,
        rewards,
        cascade,
        withdrawals,
        weekly,
        store,
    };

    let api_config = ApiConfig::from_env();
    let api_server = ApiServer::new(api_config, ctx);

    // Serve until Ctrl+C
    tokio::select! {
        result = api_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "API server error");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received (Ctrl+C)");
        }
    }

    info!("Shutting down...");
    if let Some(db) = db_pool {
        db.close().await;
        info!("Database connections closed");
    }
    info!("Rewards ledger shutdown complete");
    Ok(())
}
