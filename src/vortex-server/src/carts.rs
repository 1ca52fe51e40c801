//! Per-shopper carts.
//!
//! Each browser session owns one [`SessionCart`]. Carts validate lines
//! against the [`Catalog`] and carry the same computed fields a storefront
//! cart would (row key, hashes, totals, a handle to the product), which the
//! snapshot exporter then has to filter out.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use vortex_cart::{AddLine, CartApi, CartLine, LineData, LineRejection, ObjectRef};

use crate::catalog::Catalog;

/// A one-shot error shown on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One shopper's cart.
#[derive(Debug, Clone)]
pub struct SessionCart {
    catalog: Arc<Catalog>,
    lines: Vec<CartLine>,
    notices: Vec<Notice>,
    touched_at: Instant,
}

impl SessionCart {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            lines: Vec::new(),
            notices: Vec::new(),
            touched_at: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of line totals in cents.
    pub fn total_cents(&self) -> u64 {
        self.lines
            .iter()
            .filter_map(|l| match l.data.get("line_total") {
                Some(LineData::Value(v)) => v.as_u64(),
                _ => None,
            })
            .fold(0, u64::saturating_add)
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Drain pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn touch(&mut self) {
        self.touched_at = Instant::now();
    }

    /// Units of a product/variation already in the cart.
    fn quantity_in_cart(&self, product_id: u64, variation_id: u64) -> u32 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id && l.variation_id == variation_id)
            .map(|l| l.quantity)
            .fold(0, u32::saturating_add)
    }
}

/// Stable row key for a line: identical product, variation and custom data
/// share a row.
fn line_key(line: &AddLine) -> String {
    let identity = json!({
        "product_id": line.product_id,
        "variation_id": line.variation_id,
        "variation": line.variation,
        "custom_data": line.custom_data,
    });
    short_hash(identity.to_string().as_bytes())
}

fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..16])
}

fn set_totals(line: &mut CartLine, unit_price_cents: u64) {
    let total = unit_price_cents.saturating_mul(u64::from(line.quantity));
    line.data
        .insert("line_subtotal".to_string(), json!(total).into());
    line.data.insert("line_total".to_string(), json!(total).into());
    line.data.insert("line_tax".to_string(), json!(0).into());
}

impl CartApi for SessionCart {
    fn lines(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    fn add_line(&mut self, line: AddLine) -> Result<String, LineRejection> {
        if line.quantity == 0 {
            return Err(LineRejection::InvalidQuantity);
        }

        let offer = self.catalog.offer(line.product_id, line.variation_id)?;
        let unit_price = offer.unit_price_cents;
        if let Some(available) = offer.stock {
            let requested = self
                .quantity_in_cart(line.product_id, line.variation_id)
                .saturating_add(line.quantity);
            if requested > available {
                return Err(LineRejection::OutOfStock {
                    product_id: line.product_id,
                    requested,
                    available,
                });
            }
        }

        let key = line_key(&line);

        if let Some(existing) = self.lines.iter_mut().find(|l| l.key == key) {
            existing.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(LineRejection::InvalidQuantity)?;
            set_totals(existing, unit_price);
            self.touch();
            return Ok(key);
        }

        self.touch();

        let mut data: BTreeMap<String, LineData> = line
            .custom_data
            .iter()
            .map(|(k, v)| (k.clone(), LineData::Value(v.clone())))
            .collect();
        let data_hash = short_hash(json!(line.custom_data).to_string().as_bytes());
        data.insert("data_hash".to_string(), json!(data_hash).into());
        data.insert(
            "data".to_string(),
            LineData::Object(ObjectRef::new("Product", line.product_id)),
        );

        let mut cart_line = CartLine {
            key: key.clone(),
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
            variation: line.variation,
            data,
        };
        set_totals(&mut cart_line, unit_price);
        self.lines.push(cart_line);
        Ok(key)
    }
}

/// All shopper carts, keyed by session id.
#[derive(Debug)]
pub struct CartRegistry {
    catalog: Arc<Catalog>,
    carts: RwLock<HashMap<String, SessionCart>>,
}

impl CartRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            carts: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run `f` against a session's cart without creating one.
    pub async fn read<R>(&self, session: &str, f: impl FnOnce(&SessionCart) -> R) -> R {
        let carts = self.carts.read().await;
        match carts.get(session) {
            Some(cart) => f(cart),
            None => f(&SessionCart::new(Arc::clone(&self.catalog))),
        }
    }

    /// Run `f` against a session's cart, creating it on first use.
    pub async fn write<R>(&self, session: &str, f: impl FnOnce(&mut SessionCart) -> R) -> R {
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(session.to_string())
            .or_insert_with(|| SessionCart::new(Arc::clone(&self.catalog)));
        f(cart)
    }

    /// Drop carts untouched for longer than `idle`.
    pub async fn cleanup_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut carts = self.carts.write().await;
        let initial_count = carts.len();
        carts.retain(|_, cart| now.duration_since(cart.touched_at) < idle);
        initial_count - carts.len()
    }

    pub async fn count(&self) -> usize {
        self.carts.read().await.len()
    }
}
