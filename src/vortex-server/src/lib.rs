//! Vortex server: shareable cart links over HTTP.
//!
//! This crate provides:
//! - The cart page with a "Create Cart Link" action
//! - `/vortex/{token}` links that restore a shared cart and redirect to checkout
//! - A small JSON cart API, health checks and metrics
//!
//! Link logic lives in `vortex-cart`; this crate supplies sessions, the
//! shopper carts, CSRF nonces and the HTTP surface.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod carts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod links;
pub mod middleware;
pub mod nonce;
pub mod pages;
pub mod session;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(config.clone()).await?);
    state.start_cleanup_task();
    let app = create_router_with_state(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting Vortex server on {}", addr);
    info!("Cart links look like {}", config.link_url("<token>"));

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutting down");
    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
///
/// Every route the server answers is registered here.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let cors = middleware::cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(pages::routes())
        .merge(links::routes())
        .nest("/api/v1", api::routes())
        .layer(from_fn_with_state(
            Arc::clone(&state),
            middleware::timeout_middleware,
        ))
        .layer(from_fn_with_state(
            Arc::clone(&state),
            middleware::body_limit_middleware,
        ))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::timing_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
