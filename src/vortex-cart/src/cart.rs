//! The host cart, as seen by the exporter and importer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::LineItem;

/// Handle to an in-process object attached to a cart line.
///
/// Carts routinely hang live objects (the loaded product, pricing context)
/// off each line. Those cannot be carried inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub type_name: String,
    pub id: u64,
}

impl ObjectRef {
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }
}

/// A value stored against a cart line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineData {
    /// Plain data: scalars, arrays, maps.
    Value(serde_json::Value),
    /// A reference to a live object.
    Object(ObjectRef),
}

impl From<serde_json::Value> for LineData {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// One line of the host cart, including computed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    /// Row key that identifies the line inside its cart.
    pub key: String,
    pub product_id: u64,
    pub variation_id: u64,
    pub quantity: u32,
    pub variation: BTreeMap<String, String>,
    /// Everything else the host keeps on the line: totals, hashes, object
    /// handles and any custom data added alongside the product.
    pub data: BTreeMap<String, LineData>,
}

/// Request to add a line to a cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddLine {
    pub product_id: u64,
    pub quantity: u32,
    #[serde(default)]
    pub variation_id: u64,
    #[serde(default)]
    pub variation: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, serde_json::Value>,
}

impl From<&LineItem> for AddLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            variation_id: item.variation_id,
            variation: item.variation_attributes.clone(),
            custom_data: item.custom_data.clone(),
        }
    }
}

/// Why the host refused to add a line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineRejection {
    #[error("Product {0} does not exist")]
    UnknownProduct(u64),
    #[error("Product {product_id} has no variation {variation_id}")]
    UnknownVariation { product_id: u64, variation_id: u64 },
    #[error("Product {0} cannot be purchased")]
    NotPurchasable(u64),
    #[error("Only {available} of product {product_id} in stock ({requested} requested)")]
    OutOfStock {
        product_id: u64,
        requested: u32,
        available: u32,
    },
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

/// Operations the cart-link core needs from the host cart.
pub trait CartApi: Send + Sync {
    /// Lines currently in the cart, in display order.
    fn lines(&self) -> Vec<CartLine>;

    /// Remove every line.
    fn clear(&mut self);

    /// Add a line, returning its row key.
    fn add_line(&mut self, line: AddLine) -> Result<String, LineRejection>;
}
