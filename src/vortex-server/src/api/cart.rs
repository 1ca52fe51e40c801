//! JSON cart endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use vortex_cart::{AddLine, CartApi, CartLinkError};

use crate::carts::CartRegistry;
use crate::error::AppResult;
use crate::nonce::CREATE_LINK_ACTION;
use crate::session::ensure_session;
use crate::state::AppState;

use super::types::{AddLineResponse, CartResponse, ClearCartResponse};

fn registry(state: &AppState) -> AppResult<&CartRegistry> {
    state
        .carts
        .as_ref()
        .ok_or_else(|| CartLinkError::DependencyMissing.into())
}

/// Get the session's cart together with a fresh create-link nonce.
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<CartResponse>)> {
    let (session, jar) = ensure_session(jar);
    let carts = registry(&state)?;

    let nonce = state.nonces.issue(CREATE_LINK_ACTION, &session);
    let response = carts
        .write(&session, |cart| {
            let notices = cart.take_notices();
            CartResponse::new(cart, notices, nonce)
        })
        .await;

    Ok((jar, Json(response)))
}

/// Add a line to the session's cart.
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(line): Json<AddLine>,
) -> AppResult<(CookieJar, Json<AddLineResponse>)> {
    let (session, jar) = ensure_session(jar);
    let carts = registry(&state)?;

    let product_id = line.product_id;
    let response = carts
        .write(&session, |cart| {
            cart.add_line(line).map(|key| AddLineResponse {
                key,
                item_count: cart.item_count(),
            })
        })
        .await?;

    debug!(product_id, item_count = response.item_count, "Added cart line");
    Ok((jar, Json(response)))
}

/// Empty the session's cart.
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ClearCartResponse>)> {
    let (session, jar) = ensure_session(jar);
    let carts = registry(&state)?;

    let removed_lines = carts
        .write(&session, |cart| {
            let removed = cart.lines().len();
            cart.clear();
            removed
        })
        .await;

    Ok((jar, Json(ClearCartResponse { removed_lines })))
}
