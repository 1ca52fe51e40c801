//! Replaying a snapshot into a cart.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cart::{AddLine, CartApi, LineRejection};
use crate::snapshot::CartSnapshot;

/// A snapshot line the host refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    /// Position of the line in the snapshot.
    pub index: usize,
    pub product_id: u64,
    pub variation_id: u64,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: LineRejection,
}

fn serialize_reason<S: serde::Serializer>(reason: &LineRejection, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Row keys of the lines that made it into the cart.
    pub added: Vec<String>,
    pub failures: Vec<LineFailure>,
}

impl ImportReport {
    /// True when every snapshot line was accepted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replaces a cart's contents with a snapshot.
///
/// The destination cart is always emptied first; items already in it are
/// lost. A line the host rejects is skipped with a warning and the remaining
/// lines are still added.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartImporter;

impl CartImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn import(&self, snapshot: &CartSnapshot, cart: &mut dyn CartApi) -> ImportReport {
        cart.clear();

        let mut report = ImportReport::default();
        for (index, item) in snapshot.iter().enumerate() {
            match cart.add_line(AddLine::from(item)) {
                Ok(key) => report.added.push(key),
                Err(reason) => {
                    warn!(
                        index,
                        product_id = item.product_id,
                        variation_id = item.variation_id,
                        "Skipping cart line during import: {}",
                        reason
                    );
                    report.failures.push(LineFailure {
                        index,
                        product_id: item.product_id,
                        variation_id: item.variation_id,
                        reason,
                    });
                }
            }
        }

        debug!(
            added = report.added.len(),
            failed = report.failures.len(),
            "Snapshot imported"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;
    use crate::snapshot::LineItem;
    use std::collections::BTreeMap;

    /// Cart that refuses a fixed set of product ids.
    #[derive(Default)]
    struct RecordingCart {
        lines: Vec<AddLine>,
        refused: Vec<u64>,
        cleared: usize,
    }

    impl CartApi for RecordingCart {
        fn lines(&self) -> Vec<CartLine> {
            self.lines
                .iter()
                .enumerate()
                .map(|(i, l)| CartLine {
                    key: format!("row-{i}"),
                    product_id: l.product_id,
                    variation_id: l.variation_id,
                    quantity: l.quantity,
                    variation: l.variation.clone(),
                    data: BTreeMap::new(),
                })
                .collect()
        }

        fn clear(&mut self) {
            self.cleared += 1;
            self.lines.clear();
        }

        fn add_line(&mut self, line: AddLine) -> Result<String, LineRejection> {
            if self.refused.contains(&line.product_id) {
                return Err(LineRejection::UnknownProduct(line.product_id));
            }
            self.lines.push(line);
            Ok(format!("row-{}", self.lines.len() - 1))
        }
    }

    #[test]
    fn test_import_replaces_existing_lines() {
        let mut cart = RecordingCart::default();
        cart.add_line(AddLine {
            product_id: 99,
            quantity: 1,
            ..Default::default()
        })
        .unwrap();

        let snapshot = CartSnapshot::new(vec![LineItem::new(1, 2), LineItem::new(2, 1)]);
        let report = CartImporter::new().import(&snapshot, &mut cart);

        assert!(report.is_complete());
        assert_eq!(report.added.len(), 2);
        assert_eq!(cart.cleared, 1);
        let ids: Vec<u64> = cart.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_rejected_lines_are_skipped() {
        let mut cart = RecordingCart {
            refused: vec![2],
            ..Default::default()
        };
        let snapshot = CartSnapshot::new(vec![
            LineItem::new(1, 1),
            LineItem::new(2, 1).with_variation(20),
            LineItem::new(3, 4),
        ]);

        let report = CartImporter::new().import(&snapshot, &mut cart);

        assert!(!report.is_complete());
        assert_eq!(report.added.len(), 2);
        assert_eq!(
            report.failures,
            vec![LineFailure {
                index: 1,
                product_id: 2,
                variation_id: 20,
                reason: LineRejection::UnknownProduct(2),
            }]
        );
        let ids: Vec<u64> = cart.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_failure_serializes_reason_as_text() {
        let failure = LineFailure {
            index: 0,
            product_id: 5,
            variation_id: 0,
            reason: LineRejection::NotPurchasable(5),
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["reason"], "Product 5 cannot be purchased");
    }
}
