use crate::{handlers, health, websocket};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tradestate_core::ChangeNotifier;
use tradestate_data::{Database, Repositories};

/// Shared handler state.
pub struct AppState {
    pub repos: Repositories,
    pub notifier: ChangeNotifier,
    pub db: Database,
}

impl AppState {
    /// Builds the repositories over `db`, all publishing through `notifier`.
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self {
            repos: Repositories::new(db.clone(), notifier.clone()),
            notifier,
            db,
        }
    }
}

pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    #[must_use]
    pub fn new(db: Database, notifier: ChangeNotifier) -> Self {
        Self {
            state: Arc::new(AppState::new(db, notifier)),
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route(
                "/api/orders",
                get(handlers::list_orders).post(handlers::create_order),
            )
            .route(
                "/api/orders/:id",
                get(handlers::get_order).patch(handlers::patch_order),
            )
            .route(
                "/api/external-orders/:order_id",
                get(handlers::get_external_order).patch(handlers::patch_external_order),
            )
            .route(
                "/api/logs",
                get(handlers::list_logs).post(handlers::append_log),
            )
            .route(
                "/api/market-state",
                get(handlers::list_market_state)
                    .post(handlers::create_market_state)
                    .delete(handlers::sweep_market_state),
            )
            .route(
                "/api/market-state/:symbol",
                get(handlers::get_market_state)
                    .patch(handlers::patch_market_state)
                    .delete(handlers::delete_market_state),
            )
            .route(
                "/api/scanner",
                get(handlers::list_scanner).post(handlers::create_scanner),
            )
            .route(
                "/api/scanner/:symbol",
                get(handlers::get_scanner)
                    .patch(handlers::patch_scanner)
                    .delete(handlers::delete_scanner),
            )
            .route(
                "/api/settings",
                get(handlers::get_settings).put(handlers::put_settings),
            )
            .route("/api/health", get(health::health))
            .route("/api/save-order", post(handlers::save_order))
            .route("/orders", get(handlers::legacy_orders))
            .route("/logs", get(handlers::legacy_logs))
            .route("/ws", get(websocket::websocket_handler))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address and runs
    /// until `shutdown` completes.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve<F>(self, addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
