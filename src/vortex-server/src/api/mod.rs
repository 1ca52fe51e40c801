//! REST API routes and handlers.

mod cart;
mod health;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub use types::{CartLineResponse, CartResponse, HealthResponse};

/// Create the API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health and metrics
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::get_metrics))
        // Cart
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
}
