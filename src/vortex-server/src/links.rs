//! Create and consume cart links.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Path, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vortex_cart::{CartApi, CartLinkError, ImportReport, Lookup, Resolution};

use crate::carts::Notice;
use crate::nonce::CREATE_LINK_ACTION;
use crate::pages::ErrorPage;
use crate::session::ensure_session;
use crate::state::{AppState, counters};

/// Create link routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cart/link", post(create_link))
        .route("/vortex/", get(consume_without_token))
        .route("/vortex/{token}", get(consume_link))
        .route("/vortex/{token}/", get(consume_link))
}

/// Body of the create-link action.
#[derive(Debug, Default, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(rename = "_vortex_nonce", default)]
    pub nonce: Option<String>,
}

/// Envelope returned by the create-link action.
#[derive(Debug, Clone, Serialize)]
pub struct LinkResponse {
    pub success: bool,
    pub data: LinkResponseData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LinkResponseData {
    Link { link: String },
    Message { message: String },
}

impl LinkResponse {
    pub fn link(link: String) -> Self {
        Self {
            success: true,
            data: LinkResponseData::Link { link },
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: LinkResponseData::Message {
                message: message.into(),
            },
        }
    }
}

/// Status and envelope for a failed create.
fn failure(error: CartLinkError) -> (StatusCode, LinkResponse) {
    match error {
        CartLinkError::Store(e) => {
            tracing::error!("Failed to store cart snapshot: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                LinkResponse::failure("Could not create link."),
            )
        }
        other => (StatusCode::BAD_REQUEST, LinkResponse::failure(other.to_string())),
    }
}

/// Read the nonce from a JSON or form-encoded body.
async fn read_nonce(request: Request) -> Option<String> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let body = if is_json {
        Json::<CreateLinkRequest>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .ok()
    } else {
        Form::<CreateLinkRequest>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .ok()
    };

    body.and_then(|b| b.nonce)
}

/// `POST /cart/link`: snapshot the shopper's cart and mint a link.
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Response {
    let (session, jar) = ensure_session(jar);
    let nonce = read_nonce(request).await;

    match create(&state, &session, nonce.as_deref()).await {
        Ok(link) => {
            state.increment_counter(counters::LINKS_CREATED).await;
            (jar, Json(LinkResponse::link(link))).into_response()
        }
        Err(error) => {
            if matches!(error, CartLinkError::Store(_)) {
                state.increment_counter(counters::ERRORS).await;
            }
            let (status, body) = failure(error);
            (status, jar, Json(body)).into_response()
        }
    }
}

async fn create(
    state: &AppState,
    session: &str,
    nonce: Option<&str>,
) -> Result<String, CartLinkError> {
    let valid = nonce.is_some_and(|n| state.nonces.verify(n, CREATE_LINK_ACTION, session));
    if !valid {
        warn!("Rejected cart link request with a missing or stale nonce");
        return Err(CartLinkError::InvalidRequest);
    }

    let carts = state
        .carts
        .as_ref()
        .ok_or(CartLinkError::DependencyMissing)?;

    let snapshot = carts
        .read(session, |cart| state.links.snapshot(cart))
        .await?;
    let token = state.links.publish(&snapshot).await?;

    Ok(state.config.link_url(token.as_str()))
}

/// `GET /vortex/`: no token, nothing to restore.
pub async fn consume_without_token() -> Redirect {
    Redirect::to("/cart")
}

/// `GET /vortex/{token}`: replace the shopper's cart with the snapshot and
/// send them to checkout.
pub async fn consume_link(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(token): Path<String>,
) -> Response {
    let (session, jar) = ensure_session(jar);

    let lookup = match state.links.lookup(Some(token.as_str())).await {
        Ok(lookup) => lookup,
        Err(error) => {
            state.increment_counter(counters::ERRORS).await;
            tracing::error!("Cart link lookup failed: {}", error);
            return (jar, ErrorPage::from(error)).into_response();
        }
    };
    if matches!(lookup, Lookup::NotFound) {
        state.increment_counter(counters::LINKS_NOT_FOUND).await;
    }

    let resolution = match &state.carts {
        Some(carts) => {
            carts
                .write(&session, |cart| {
                    let target: &mut dyn CartApi = &mut *cart;
                    let resolution = state.links.apply(lookup, Some(target));
                    if let Resolution::Redirect(report) = &resolution {
                        for notice in import_notices(report) {
                            cart.push_notice(notice);
                        }
                    }
                    resolution
                })
                .await
        }
        None => state.links.apply(lookup, None),
    };

    match resolution {
        Resolution::PassThrough => (jar, Redirect::to("/cart")).into_response(),
        Resolution::Redirect(report) => {
            state.increment_counter(counters::LINKS_RESOLVED).await;
            state
                .add_to_counter(counters::IMPORT_FAILURES, report.failures.len() as u64)
                .await;
            info!(
                added = report.added.len(),
                failed = report.failures.len(),
                "Cart restored from link"
            );
            (jar, Redirect::to(&state.config.checkout_url())).into_response()
        }
        Resolution::Fail(error) => (jar, ErrorPage::from(error)).into_response(),
    }
}

/// One error notice per snapshot line the cart refused.
fn import_notices(report: &ImportReport) -> Vec<Notice> {
    report
        .failures
        .iter()
        .map(|f| {
            Notice::error(format!(
                "An item from the shared cart could not be added: {}.",
                f.reason
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortex_cart::{LineFailure, LineRejection};

    #[test]
    fn test_link_response_shape() {
        let ok = serde_json::to_value(LinkResponse::link("http://x/vortex/abc".into())).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({ "success": true, "data": { "link": "http://x/vortex/abc" } })
        );

        let err = serde_json::to_value(LinkResponse::failure("Cart is empty.")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({ "success": false, "data": { "message": "Cart is empty." } })
        );
    }

    #[test]
    fn test_error_statuses() {
        let (status, body) = failure(CartLinkError::InvalidRequest);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);

        let (status, _) = failure(CartLinkError::Store(vortex_cart::StoreError::Task(
            "boom".into(),
        )));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_import_notices() {
        let report = ImportReport {
            added: vec!["k".into()],
            failures: vec![LineFailure {
                index: 1,
                product_id: 9,
                variation_id: 0,
                reason: LineRejection::UnknownProduct(9),
            }],
        };
        let notices = import_notices(&report);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Product 9 does not exist"));
    }
}
