//! Snapshot data model.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::token::Token;

/// One product/variation/quantity/custom-data tuple captured from a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: u64,
    /// `0` when the line is not a variation.
    #[serde(default)]
    pub variation_id: u64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variation_attributes: BTreeMap<String, String>,
    /// Whitelisted per-line metadata (engravings, mockup references, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: BTreeMap<String, serde_json::Value>,
}

impl LineItem {
    pub fn new(product_id: u64, quantity: u32) -> Self {
        Self {
            product_id,
            variation_id: 0,
            quantity,
            variation_attributes: BTreeMap::new(),
            custom_data: BTreeMap::new(),
        }
    }

    pub fn with_variation(mut self, variation_id: u64) -> Self {
        self.variation_id = variation_id;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variation_attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_data.insert(key.into(), value);
        self
    }
}

/// Ordered line items captured from a cart at one point in time.
///
/// Immutable once stored. Serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartSnapshot {
    items: Vec<LineItem>,
}

impl CartSnapshot {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<LineItem> for CartSnapshot {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A snapshot as held by a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub token: Token,
    pub snapshot: CartSnapshot,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl StoreEntry {
    pub fn new(token: Token, snapshot: CartSnapshot, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token,
            snapshot,
            created_at,
            ttl,
        }
    }

    /// First instant at which the entry is no longer resolvable.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Resolvable while `now < created_at + ttl`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}
