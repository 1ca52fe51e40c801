//! End-to-end behaviour of cart links against in-memory carts and stores.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use vortex_cart::{
    AddLine, CartApi, CartLine, CartLinkError, CartLinkService, LineData, LineRejection, Lookup,
    ManualClock, MemorySnapshotStore, ObjectRef, Resolution, SnapshotStore, Token,
    TokenGenerator,
};

/// Minimal host cart: every line is accepted except ids listed in `missing`,
/// and each line carries the computed fields a real cart would add.
#[derive(Default)]
struct TestCart {
    lines: Vec<CartLine>,
    missing: Vec<u64>,
}

impl CartApi for TestCart {
    fn lines(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn add_line(&mut self, line: AddLine) -> Result<String, LineRejection> {
        if self.missing.contains(&line.product_id) {
            return Err(LineRejection::UnknownProduct(line.product_id));
        }
        let key = format!("{}-{}-{}", line.product_id, line.variation_id, self.lines.len());
        let mut data: BTreeMap<String, LineData> = line
            .custom_data
            .into_iter()
            .map(|(k, v)| (k, LineData::Value(v)))
            .collect();
        data.insert("line_total".into(), json!(line.quantity * 1000).into());
        data.insert("data_hash".into(), json!("abc").into());
        data.insert(
            "data".into(),
            LineData::Object(ObjectRef::new("Product", line.product_id)),
        );

        self.lines.push(CartLine {
            key: key.clone(),
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
            variation: line.variation,
            data,
        });
        Ok(key)
    }
}

fn add(cart: &mut TestCart, product_id: u64, quantity: u32) {
    cart.add_line(AddLine {
        product_id,
        quantity,
        ..Default::default()
    })
    .unwrap();
}

fn populated_cart() -> TestCart {
    let mut cart = TestCart::default();
    add(&mut cart, 10, 2);
    cart.add_line(AddLine {
        product_id: 20,
        quantity: 1,
        variation_id: 21,
        variation: BTreeMap::from([("attribute_pa_color".into(), "blue".into())]),
        custom_data: BTreeMap::from([
            ("engraving".into(), json!("To Alex")),
            ("mockup_ids".into(), json!([3, 4])),
        ]),
    })
    .unwrap();
    add(&mut cart, 30, 5);
    cart
}

/// Comparable view of a line: everything except row keys and computed data.
fn summary(cart: &TestCart) -> Vec<(u64, u64, u32, BTreeMap<String, String>, Vec<String>)> {
    cart.lines
        .iter()
        .map(|l| {
            (
                l.product_id,
                l.variation_id,
                l.quantity,
                l.variation.clone(),
                l.data.keys().cloned().collect(),
            )
        })
        .collect()
}

fn service_with_clock() -> (CartLinkService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemorySnapshotStore::with_clock(clock.clone()));
    (CartLinkService::new(store), clock)
}

#[tokio::test]
async fn round_trip_restores_every_line() {
    let (service, _clock) = service_with_clock();
    let source = populated_cart();

    let token = service.create(&source).await.unwrap();

    let mut target = TestCart::default();
    let resolution = service
        .resolve(Some(token.as_str()), Some(&mut target))
        .await;

    match resolution {
        Resolution::Redirect(report) => {
            assert!(report.is_complete());
            assert_eq!(report.added.len(), 3);
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(summary(&target), summary(&source));
    assert_eq!(
        target.lines[1].data["engraving"],
        LineData::Value(json!("To Alex"))
    );
}

#[tokio::test]
async fn snapshot_expires_after_ttl() {
    let (service, clock) = service_with_clock();
    let service = service.with_ttl(Duration::from_secs(3600));
    let token = service.create(&populated_cart()).await.unwrap();

    clock.advance(Duration::from_secs(3599));
    assert!(matches!(
        service.lookup(Some(token.as_str())).await.unwrap(),
        Lookup::Found(..)
    ));

    clock.advance(Duration::from_secs(2));
    assert_eq!(
        service.lookup(Some(token.as_str())).await.unwrap(),
        Lookup::NotFound
    );
}

#[tokio::test]
async fn default_ttl_is_one_day() {
    let (service, clock) = service_with_clock();
    assert_eq!(service.ttl(), Duration::from_secs(86_400));
    let token = service.create(&populated_cart()).await.unwrap();

    clock.advance(Duration::from_secs(86_399));
    assert!(matches!(
        service.lookup(Some(token.as_str())).await.unwrap(),
        Lookup::Found(..)
    ));
    clock.advance(Duration::from_secs(1));
    assert_eq!(
        service.lookup(Some(token.as_str())).await.unwrap(),
        Lookup::NotFound
    );
}

#[tokio::test]
async fn import_replaces_unrelated_items() {
    let (service, _clock) = service_with_clock();
    let mut shared = TestCart::default();
    add(&mut shared, 1, 1);
    let token = service.create(&shared).await.unwrap();

    let mut target = TestCart::default();
    add(&mut target, 500, 9);
    add(&mut target, 501, 1);

    let resolution = service
        .resolve(Some(token.as_str()), Some(&mut target))
        .await;
    assert!(resolution.is_redirect());
    let ids: Vec<u64> = target.lines.iter().map(|l| l.product_id).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn empty_cart_mints_no_token() {
    let (service, _clock) = service_with_clock();

    let result = service.create(&TestCart::default()).await;

    assert!(matches!(result, Err(CartLinkError::EmptyCart)));
    assert_eq!(service.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_tokens_are_not_found() {
    let (service, _clock) = service_with_clock();
    let generator = TokenGenerator::default();

    for _ in 0..20 {
        let mut cart = populated_cart();
        let raw = generator.generate();
        let resolution = service.resolve(Some(raw.as_str()), Some(&mut cart)).await;
        assert!(matches!(
            resolution,
            Resolution::Fail(CartLinkError::TokenNotFound)
        ));
        // A failed lookup never touches the cart.
        assert_eq!(cart.lines.len(), 3);
    }

    for raw in ["../../etc/passwd", "%00", "a b", "\u{1F6D2}"] {
        let resolution = service.resolve(Some(raw), None).await;
        assert!(matches!(
            resolution,
            Resolution::Fail(CartLinkError::TokenNotFound)
        ));
    }
}

#[tokio::test]
async fn missing_token_passes_through() {
    let (service, _clock) = service_with_clock();
    assert!(matches!(
        service.resolve(None, None).await,
        Resolution::PassThrough
    ));
    assert!(matches!(
        service.resolve(Some(""), None).await,
        Resolution::PassThrough
    ));
}

#[tokio::test]
async fn found_token_without_cart_is_dependency_missing() {
    let (service, _clock) = service_with_clock();
    let token = service.create(&populated_cart()).await.unwrap();

    let resolution = service.resolve(Some(token.as_str()), None).await;
    assert!(matches!(
        resolution,
        Resolution::Fail(CartLinkError::DependencyMissing)
    ));
}

#[tokio::test]
async fn links_are_reusable_until_expiry() {
    let (service, _clock) = service_with_clock();
    let token = service.create(&populated_cart()).await.unwrap();

    for _ in 0..3 {
        let mut target = TestCart::default();
        let resolution = service
            .resolve(Some(token.as_str()), Some(&mut target))
            .await;
        assert!(resolution.is_redirect());
        assert_eq!(target.lines.len(), 3);
    }
}

#[tokio::test]
async fn only_whitelisted_custom_data_round_trips() {
    let (service, _clock) = service_with_clock();
    let mut source = TestCart::default();
    source
        .add_line(AddLine {
            product_id: 77,
            quantity: 1,
            custom_data: BTreeMap::from([("gift_note".into(), json!("Enjoy"))]),
            ..Default::default()
        })
        .unwrap();
    source.lines[0]
        .data
        .insert("line_subtotal".into(), json!(12.5).into());

    let token = service.create(&source).await.unwrap();
    let Lookup::Found(_, snapshot) = service.lookup(Some(token.as_str())).await.unwrap() else {
        panic!("token should resolve");
    };

    let custom: Vec<&String> = snapshot.items()[0].custom_data.keys().collect();
    assert_eq!(custom, vec!["gift_note"]);
}

#[tokio::test]
async fn partial_import_keeps_remaining_lines() {
    let (service, _clock) = service_with_clock();
    let token = service.create(&populated_cart()).await.unwrap();

    let mut target = TestCart {
        missing: vec![20],
        ..Default::default()
    };
    let Resolution::Redirect(report) = service
        .resolve(Some(token.as_str()), Some(&mut target))
        .await
    else {
        panic!("expected redirect");
    };

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_id, 20);
    let ids: Vec<u64> = target.lines.iter().map(|l| l.product_id).collect();
    assert_eq!(ids, vec![10, 30]);
}

#[test]
fn token_collisions_are_negligible() {
    let generator = TokenGenerator::default();
    let mut seen = HashSet::new();
    let mut collisions = 0;
    for _ in 0..10_000 {
        let token = generator.generate();
        assert!(Token::parse(token.as_str()).is_some());
        if !seen.insert(token) {
            collisions += 1;
        }
    }
    // Under 0.1%; the expected count for 62^8 tokens is about 2e-7.
    assert!(collisions < 10, "{collisions} collisions in 10,000 tokens");
}
