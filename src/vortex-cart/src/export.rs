//! Turning a live cart into a snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::CartLinkError;
use crate::cart::{CartApi, CartLine, LineData};
use crate::snapshot::{CartSnapshot, LineItem};

/// Line fields that are computed by the cart or already carried explicitly
/// by [`LineItem`], and so never copied into `custom_data`.
pub const DEFAULT_DENIED_KEYS: &[&str] = &[
    "product_id",
    "variation_id",
    "variation",
    "quantity",
    "data",
    "data_hash",
    "key",
    "line_total",
    "line_subtotal",
    "line_tax",
    "line_tax_data",
    "line_subtotal_tax",
    "stamp",
];

/// Reads a cart into a [`CartSnapshot`].
#[derive(Debug, Clone)]
pub struct CartExporter {
    denied: BTreeSet<String>,
}

impl CartExporter {
    pub fn new() -> Self {
        Self {
            denied: DEFAULT_DENIED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Deny additional keys on top of [`DEFAULT_DENIED_KEYS`].
    pub fn with_extra_denied_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_denied(&self, key: &str) -> bool {
        self.denied.contains(key)
    }

    /// Snapshot every line of `cart`.
    ///
    /// Fails with [`CartLinkError::EmptyCart`] when there is nothing to share.
    pub fn export(&self, cart: &dyn CartApi) -> Result<CartSnapshot, CartLinkError> {
        let lines = cart.lines();
        if lines.is_empty() {
            return Err(CartLinkError::EmptyCart);
        }
        Ok(lines.iter().map(|line| self.export_line(line)).collect())
    }

    fn export_line(&self, line: &CartLine) -> LineItem {
        LineItem {
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
            variation_attributes: line.variation.clone(),
            custom_data: self.custom_data(&line.data),
        }
    }

    fn custom_data(&self, data: &BTreeMap<String, LineData>) -> BTreeMap<String, serde_json::Value> {
        data.iter()
            .filter(|(key, _)| !self.is_denied(key))
            .filter_map(|(key, value)| match value {
                LineData::Value(v) => Some((key.clone(), v.clone())),
                LineData::Object(_) => None,
            })
            .collect()
    }
}

impl Default for CartExporter {
    fn default() -> Self {
        Self::new()
    }
}
