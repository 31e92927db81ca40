use crate::config::ApiConfig;
use crate::routes::{router, AppContext};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// REST API server for event sources, the payment rail and dashboards.
pub struct ApiServer {
    config: ApiConfig,
    ctx: AppContext,
}

impl ApiServer {
    pub fn new(config: ApiConfig, ctx: AppContext) -> Self {
        Self { config, ctx }
    }

    /// Start the server
    pub async fn run(self) -> crate::Result<()> {
        let addr = self.config.address();

        let cors = if self.config.cors_enabled {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        let app = router(self.ctx)
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        info!(address = %addr, "Starting ledger API server");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        Ok(())
    }
}
