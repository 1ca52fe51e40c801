//! Storefront pages: cart, checkout and terminal error pages.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use vortex_cart::{CartApi, CartLine, CartLinkError, LineData, Token};

use crate::carts::{Notice, SessionCart};
use crate::nonce::CREATE_LINK_ACTION;
use crate::session::ensure_session;
use crate::state::AppState;

/// Create page routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cart", get(cart_page))
        .route("/checkout", get(checkout_page))
}

/// Terminal HTML error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorPage {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CartLinkError> for ErrorPage {
    fn from(error: CartLinkError) -> Self {
        let status = match &error {
            CartLinkError::InvalidRequest | CartLinkError::EmptyCart => StatusCode::BAD_REQUEST,
            CartLinkError::TokenNotFound => StatusCode::NOT_FOUND,
            CartLinkError::DependencyMissing => StatusCode::SERVICE_UNAVAILABLE,
            CartLinkError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &error {
            // Store details stay in the logs.
            CartLinkError::Store(_) => "Something went wrong. Please try again.".to_string(),
            _ => error.to_string(),
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let body = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Cart link</title></head>
<body>
<div class="vortex-error" role="alert"><p>{}</p></div>
<p><a href="/cart">Return to cart</a></p>
</body>
</html>"#,
            escape_html(&self.message)
        );
        (self.status, Html(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CartPageQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Cart page with the "Create Cart Link" button.
pub async fn cart_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CartPageQuery>,
) -> Response {
    let (session, jar) = ensure_session(jar);
    let Some(carts) = &state.carts else {
        return (jar, ErrorPage::from(CartLinkError::DependencyMissing)).into_response();
    };

    let (rows, total, notices, empty) = carts
        .write(&session, |cart| {
            (
                render_lines(cart),
                cart.total_cents(),
                cart.take_notices(),
                cart.is_empty(),
            )
        })
        .await;

    let mut notices = render_notices(&notices);
    if let Some(token) = query.token.as_deref().and_then(Token::parse) {
        let link = escape_html(&state.config.link_url(token.as_str()));
        notices.push_str(&format!(
            r#"<div class="vortex-notice" role="status">Your cart link: <a href="{link}" target="_blank">{link}</a> <button type="button" id="vortex-copy" data-link="{link}">Copy</button></div>
"#
        ));
    }

    let actions = if empty {
        "<p>Your cart is currently empty.</p>".to_string()
    } else {
        let nonce = state.nonces.issue(CREATE_LINK_ACTION, &session);
        format!(
            r#"<button type="button" class="vortex-create-link" data-nonce="{nonce}" data-url="/cart/link">Create Cart Link</button>"#
        )
    };

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Cart</title></head>
<body>
<div class="vortex-notices">
{notices}</div>
<h1>Cart</h1>
<table class="cart">
<thead><tr><th>Product</th><th>Options</th><th>Quantity</th><th>Total</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<p class="cart-total">Total: {total}</p>
<div class="cart-actions">{actions}</div>
<script>{script}</script>
</body>
</html>"#,
        total = format_price(total),
        script = CART_SCRIPT,
    );

    (jar, Html(body)).into_response()
}

/// Checkout page listing the cart and any notices left by an import.
pub async fn checkout_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (session, jar) = ensure_session(jar);
    let Some(carts) = &state.carts else {
        return (jar, ErrorPage::from(CartLinkError::DependencyMissing)).into_response();
    };

    let (rows, total, notices) = carts
        .write(&session, |cart| {
            (render_lines(cart), cart.total_cents(), cart.take_notices())
        })
        .await;

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Checkout</title></head>
<body>
<div class="vortex-notices">
{notices}</div>
<h1>Checkout</h1>
<table class="checkout">
<tbody>
{rows}</tbody>
</table>
<p class="order-total">Order total: {total}</p>
</body>
</html>"#,
        notices = render_notices(&notices),
        total = format_price(total),
    );

    (jar, Html(body)).into_response()
}

fn render_lines(cart: &SessionCart) -> String {
    cart.lines()
        .iter()
        .map(|line| render_line(cart, line))
        .collect()
}

fn render_line(cart: &SessionCart, line: &CartLine) -> String {
    let name = cart
        .catalog()
        .get(line.product_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("Product #{}", line.product_id));
    let options = line
        .variation
        .iter()
        .map(|(k, v)| format!("{}: {}", k.trim_start_matches("attribute_"), v))
        .collect::<Vec<_>>()
        .join(", ");
    let total = match line.data.get("line_total") {
        Some(LineData::Value(v)) => v.as_u64().unwrap_or(0),
        _ => 0,
    };

    format!(
        "<tr data-key=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        escape_html(&line.key),
        escape_html(&name),
        escape_html(&options),
        line.quantity,
        format_price(total)
    )
}

fn render_notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|n| {
            format!(
                "<div class=\"vortex-error\" role=\"alert\">{}</div>\n",
                escape_html(&n.message)
            )
        })
        .collect()
}

fn format_price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Escape text for an HTML body or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Posts the nonce, copies the returned link and shows the outcome.
const CART_SCRIPT: &str = r#"
(function () {
  function showNotice(message, type, link) {
    var wrapper = document.querySelector('.vortex-notices') || document.body;
    var notice = document.createElement('div');
    notice.setAttribute('role', 'alert');
    notice.className = type === 'error' ? 'vortex-error' : 'vortex-message';
    notice.appendChild(document.createTextNode(message));
    if (link) {
      var anchor = document.createElement('a');
      anchor.href = link;
      anchor.target = '_blank';
      anchor.rel = 'noreferrer noopener';
      anchor.textContent = 'View link';
      notice.appendChild(document.createTextNode(' '));
      notice.appendChild(anchor);
    }
    wrapper.prepend(notice);
    setTimeout(function () { notice.remove(); }, 6000);
  }

  document.addEventListener('click', async function (e) {
    var target = e.target;
    if (target && target.id === 'vortex-copy') {
      await navigator.clipboard.writeText(target.dataset.link);
      showNotice('Link copied.', 'success');
      return;
    }
    if (!target || !target.classList.contains('vortex-create-link')) {
      return;
    }
    e.preventDefault();
    var original = target.textContent;
    target.disabled = true;
    target.textContent = 'Creating...';
    try {
      var res = await fetch(target.dataset.url, {
        method: 'POST',
        headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
        body: new URLSearchParams({ _vortex_nonce: target.dataset.nonce })
      });
      var data = await res.json();
      if (!res.ok || !data.success || !data.data || !data.data.link) {
        throw new Error(data.data && data.data.message ? data.data.message : 'Could not create link.');
      }
      if (!navigator.clipboard || !navigator.clipboard.writeText) {
        throw new Error('Clipboard not available.');
      }
      await navigator.clipboard.writeText(data.data.link);
      showNotice('Cart link copied to clipboard.', 'success', data.data.link);
    } catch (err) {
      showNotice(err && err.message ? err.message : 'Unexpected error.', 'error');
    } finally {
      target.disabled = false;
      target.textContent = original;
    }
  });
})();
"#;
