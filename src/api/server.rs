//! API Server
//!
//! Wires the ledger, catalog, resolver and round scheduler into shared state
//! and serves the router with the standard middleware stack.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::auth::{TokenAuthenticator, TokenStore};
use crate::broadcast::EventBroadcaster;
use crate::config::{LuckyBetConfig, ServerConfig};
use crate::games::{GameCatalog, RandomSource, WagerResolver};
use crate::ledger::Ledger;
use crate::metrics::Metrics;
use crate::round::RoundScheduler;
use crate::storage::OptimizedStorage;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

const BROADCAST_CAPACITY: usize = 1024;

impl AppState {
    /// Assemble every component over one storage handle
    pub fn build(
        config: &LuckyBetConfig,
        storage: OptimizedStorage,
        random: Arc<dyn RandomSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(storage.clone(), config.ledger.clone()));
        let catalog = Arc::new(GameCatalog::new(storage.clone()));
        let resolver = Arc::new(WagerResolver::new(
            ledger.clone(),
            catalog.clone(),
            random.clone(),
            metrics.clone(),
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            config.round.clone(),
            ledger.clone(),
            EventBroadcaster::new(BROADCAST_CAPACITY),
            random,
            metrics.clone(),
        ));
        let tokens = TokenStore::new(storage);
        let authenticator = Arc::new(TokenAuthenticator::new(tokens.clone(), ledger.clone()));

        Self {
            ledger,
            catalog,
            resolver,
            scheduler,
            tokens,
            authenticator,
            metrics,
            admin_api_key: config.server.admin_api_key.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Router plus the middleware stack
pub fn build_app(state: Arc<AppState>, config: &ServerConfig) -> axum::Router {
    create_router(state)
        // Request ID middleware (first for tracing)
        .layer(axum::middleware::from_fn(request_id_middleware))
        // CORS layer (before timeout to handle preflight)
        .layer(create_cors_layer(config.allowed_origins.clone()))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.get_socket_addr()?;
        let app = build_app(self.state.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("LuckyBet API listening on http://{}", addr);
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        if self.state.admin_api_key.is_none() {
            info!("   Admin API disabled (no admin_api_key configured)");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
