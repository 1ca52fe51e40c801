//! API request and response types.

use std::collections::BTreeMap;

use serde::Serialize;

use vortex_cart::{CartApi, CartLine, LineData};

use crate::carts::{Notice, SessionCart};

// ============================================================================
// Health and Metrics
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// False when the cart subsystem is disabled.
    pub cart_available: bool,
}

// ============================================================================
// Cart
// ============================================================================

/// One cart line as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineResponse {
    pub key: String,
    pub product_id: u64,
    pub variation_id: u64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variation: BTreeMap<String, String>,
    /// Plain line data, including computed fields. Object handles are omitted.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl From<&CartLine> for CartLineResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            key: line.key.clone(),
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
            variation: line.variation.clone(),
            data: line
                .data
                .iter()
                .filter_map(|(k, v)| match v {
                    LineData::Value(v) => Some((k.clone(), v.clone())),
                    LineData::Object(_) => None,
                })
                .collect(),
        }
    }
}

/// Cart response.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLineResponse>,
    pub item_count: u64,
    pub total_cents: u64,
    /// Pending notices, drained by this read.
    pub notices: Vec<Notice>,
    /// Nonce to send as `_vortex_nonce` when creating a link.
    pub link_nonce: String,
}

impl CartResponse {
    pub fn new(cart: &SessionCart, notices: Vec<Notice>, link_nonce: String) -> Self {
        Self {
            lines: cart.lines().iter().map(CartLineResponse::from).collect(),
            item_count: cart.item_count(),
            total_cents: cart.total_cents(),
            notices,
            link_nonce,
        }
    }
}

/// Add-line response.
#[derive(Debug, Serialize)]
pub struct AddLineResponse {
    pub key: String,
    pub item_count: u64,
}

/// Clear-cart response.
#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub removed_lines: usize,
}
