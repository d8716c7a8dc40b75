//! HTTP surface.
//!
//! - `GET /` runs a faceted search; parameters come from the query string.
//! - `GET /{id}` returns one fully projected paper. Old-style identifiers
//!   contain a `/`, so the id is captured with a wildcard.
//! - `GET /status` probes the document store.

mod error;
mod handlers;

pub use error::{ApiError, ErrorBody};
pub use handlers::{is_bearer, query_pairs};

use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::search::SearchService;

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub auth: AuthConfig,
}

/// Build the application router
pub fn router(service: Arc<SearchService>, auth: AuthConfig) -> Router {
    let state = AppState { service, auth };

    Router::new()
        .route("/", get(handlers::handle_search))
        .route("/*id", get(handlers::handle_get_paper))
        .route_layer(middleware::from_fn_with_state(state.clone(), handlers::require_bearer))
        .route("/status", get(handlers::handle_status))
        .with_state(state)
}

/// Serve the router until Ctrl+C
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
