//! Link resolution state machine.
//!
//! ```text
//! NoToken ──────────────────────────────► PassThrough
//! TokenPresent ─► Lookup ─► NotFound ───► Fail(TokenNotFound)
//!                          └► Found ─► cart missing ─► Fail(DependencyMissing)
//!                                   └► Import ───────► Redirect
//! ```
//!
//! Every transition runs once per request. Lookup is async (it hits the
//! store); applying the result is synchronous so callers can take their cart
//! lock only after the store has answered.

use crate::CartLinkError;
use crate::cart::CartApi;
use crate::import::{CartImporter, ImportReport};
use crate::snapshot::CartSnapshot;
use crate::token::Token;

/// Result of looking a token up in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The request carried no token; nothing to do.
    NoToken,
    Found(Token, CartSnapshot),
    /// Expired, unknown or malformed token.
    NotFound,
}

impl Lookup {
    /// Classify a raw token taken from a request.
    pub(crate) fn classify(raw: Option<&str>) -> Result<Token, Lookup> {
        match raw.map(str::trim) {
            None | Some("") => Err(Lookup::NoToken),
            Some(raw) => Token::parse(raw).ok_or(Lookup::NotFound),
        }
    }
}

/// Terminal state for one request.
#[derive(Debug)]
pub enum Resolution {
    /// No token: let the request continue untouched.
    PassThrough,
    /// Cart restored; send the shopper to checkout.
    Redirect(ImportReport),
    Fail(CartLinkError),
}

impl Resolution {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }
}

/// Drive a lookup result to its terminal state.
pub(crate) fn apply(
    importer: &CartImporter,
    lookup: Lookup,
    cart: Option<&mut dyn CartApi>,
) -> Resolution {
    match lookup {
        Lookup::NoToken => Resolution::PassThrough,
        Lookup::NotFound => Resolution::Fail(CartLinkError::TokenNotFound),
        Lookup::Found(token, snapshot) => match cart {
            None => {
                tracing::warn!(token = %token, "Cart link resolved but no cart is available");
                Resolution::Fail(CartLinkError::DependencyMissing)
            }
            Some(cart) => Resolution::Redirect(importer.import(&snapshot, cart)),
        },
    }
}
