//! Product catalog backing the shopper carts.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use vortex_cart::LineRejection;

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// Unit price in cents.
    #[serde(default)]
    pub price_cents: u64,
    /// Units in stock; `None` means stock is not tracked.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_purchasable")]
    pub purchasable: bool,
    #[serde(default)]
    pub variations: Vec<Variation>,
}

fn default_purchasable() -> bool {
    true
}

/// A variation of a product (size, colour, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub id: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Overrides the parent price when set.
    #[serde(default)]
    pub price_cents: Option<u64>,
    #[serde(default)]
    pub stock: Option<u32>,
}

/// What the catalog says about one product/variation pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer<'a> {
    pub product: &'a Product,
    pub unit_price_cents: u64,
    pub stock: Option<u32>,
}

/// Products by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<u64, Product>,
}

impl Catalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Load products from a JSON array file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Vec<Product>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let products: Vec<Product> = serde_json::from_str(&content)?;
        info!("Loaded {} products from {:?}", products.len(), path);
        Ok(products)
    }

    pub fn get(&self, id: u64) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Resolve the price and stock for a product or one of its variations.
    pub fn offer(&self, product_id: u64, variation_id: u64) -> Result<Offer<'_>, LineRejection> {
        let product = self
            .get(product_id)
            .ok_or(LineRejection::UnknownProduct(product_id))?;
        if !product.purchasable {
            return Err(LineRejection::NotPurchasable(product_id));
        }

        if variation_id == 0 {
            return Ok(Offer {
                product,
                unit_price_cents: product.price_cents,
                stock: product.stock,
            });
        }

        let variation = product
            .variations
            .iter()
            .find(|v| v.id == variation_id)
            .ok_or(LineRejection::UnknownVariation {
                product_id,
                variation_id,
            })?;

        Ok(Offer {
            product,
            unit_price_cents: variation.price_cents.unwrap_or(product.price_cents),
            stock: variation.stock.or(product.stock),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> Product {
        Product {
            id: 1,
            name: "Shirt".to_string(),
            price_cents: 2000,
            stock: Some(10),
            purchasable: true,
            variations: vec![Variation {
                id: 11,
                attributes: BTreeMap::from([("attribute_pa_size".into(), "xl".into())]),
                price_cents: Some(2500),
                stock: Some(2),
            }],
        }
    }

    #[test]
    fn test_offer_for_simple_product() {
        let catalog = Catalog::new([shirt()]);
        let offer = catalog.offer(1, 0).unwrap();
        assert_eq!(offer.unit_price_cents, 2000);
        assert_eq!(offer.stock, Some(10));
    }

    #[test]
    fn test_offer_for_variation() {
        let catalog = Catalog::new([shirt()]);
        let offer = catalog.offer(1, 11).unwrap();
        assert_eq!(offer.unit_price_cents, 2500);
        assert_eq!(offer.stock, Some(2));
    }

    #[test]
    fn test_offer_rejections() {
        let mut hidden = shirt();
        hidden.id = 2;
        hidden.purchasable = false;
        let catalog = Catalog::new([shirt(), hidden]);

        assert_eq!(catalog.offer(9, 0), Err(LineRejection::UnknownProduct(9)));
        assert_eq!(catalog.offer(2, 0), Err(LineRejection::NotPurchasable(2)));
        assert_eq!(
            catalog.offer(1, 99),
            Err(LineRejection::UnknownVariation {
                product_id: 1,
                variation_id: 99
            })
        );
    }

    #[test]
    fn test_product_defaults() {
        let product: Product = serde_json::from_str(r#"{ "id": 3, "name": "Mug" }"#).unwrap();
        assert!(product.purchasable);
        assert_eq!(product.stock, None);
        assert!(product.variations.is_empty());
    }
}
