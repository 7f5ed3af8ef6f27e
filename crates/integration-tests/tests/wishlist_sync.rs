//! End-to-end wishlist tests.
//!
//! Wishlist writes are direct (no debounce): each action posts to the stub
//! service, adopts the canonical response, and keeps the snapshot/reference
//! tagging intact across round-trips.

use rust_decimal::Decimal;
use std::sync::atomic::Ordering;

use driftwood_core::{CurrencyCode, Price, ProductId, VariantId, VariantSelection};
use driftwood_integration_tests::TestContext;
use driftwood_sync::{WishlistEntry, WishlistSnapshot};

fn snapshot(product: &str, variant: Option<&str>, selection: VariantSelection) -> WishlistSnapshot {
    WishlistSnapshot::capture(
        ProductId::new(product),
        variant.map(VariantId::new),
        selection,
        format!("{product} name"),
        Price::new(Decimal::new(4500, 2), CurrencyCode::USD),
        Some("https://cdn.example/p.jpg".to_string()),
    )
}

#[tokio::test]
async fn test_snapshot_survives_round_trip_with_tagging() {
    let ctx = TestContext::new().await;
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_snapshot(snapshot(
            "P1",
            Some("V1"),
            VariantSelection::from_options(Some("M"), Some("red")),
        ))
        .await
        .expect("save snapshot");

    // A later visit hydrates from the server and still sees a snapshot.
    let revisit = ctx.session();
    revisit.hydrate().await;

    let entries = revisit.wishlist_entries();
    assert_eq!(entries.len(), 1);
    let WishlistEntry::Snapshot(entry) = &entries[0] else {
        panic!("expected snapshot entry after round-trip");
    };
    assert_eq!(entry.name, "P1 name");
    assert_eq!(entry.price.amount, Decimal::new(4500, 2));
    assert_eq!(
        entry.variant_id.as_ref().map(VariantId::as_str),
        Some("V1")
    );

    // The matching predicate keeps working on the normalized entry.
    let p1 = ProductId::new("P1");
    assert!(revisit.is_saved(&p1, &VariantSelection::none(), Some(&VariantId::new("V1"))));
    let by_map = VariantSelection::none()
        .with_dimension("color", "red")
        .with_dimension("size", "M");
    assert!(revisit.is_saved(&p1, &by_map, None));
}

#[tokio::test]
async fn test_duplicate_save_yields_one_entry_and_one_write() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-wl");
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_snapshot(snapshot(
            "P1",
            Some("V1"),
            VariantSelection::from_options(Some("M"), None),
        ))
        .await
        .expect("first save");

    // Saving again with dimensions resolving to the same variant is a no-op.
    session
        .save_snapshot(snapshot(
            "P1",
            Some("V1"),
            VariantSelection::none().with_dimension("size", "M"),
        ))
        .await
        .expect("second save");

    assert_eq!(session.saved_count(), 1);
    assert_eq!(ctx.state.server_wishlist("guest-wl").len(), 1);
}

#[tokio::test]
async fn test_reference_dedup_per_product() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-ref");
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_reference(ProductId::new("P1"))
        .await
        .expect("first save");
    session
        .save_reference(ProductId::new("P1"))
        .await
        .expect("duplicate save is a no-op");

    assert_eq!(session.saved_count(), 1);
    assert_eq!(ctx.state.server_wishlist("guest-ref").len(), 1);
    assert!(matches!(
        session.wishlist_entries()[0],
        WishlistEntry::Reference { .. }
    ));
}

#[tokio::test]
async fn test_remove_with_variant_id_keeps_siblings() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-siblings");
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_snapshot(snapshot(
            "P1",
            Some("V1"),
            VariantSelection::from_options(Some("M"), None),
        ))
        .await
        .expect("save V1");
    session
        .save_snapshot(snapshot(
            "P1",
            Some("V2"),
            VariantSelection::from_options(Some("L"), None),
        ))
        .await
        .expect("save V2");

    session
        .remove_saved(&ProductId::new("P1"), Some(&VariantId::new("V1")))
        .await
        .expect("remove V1");

    let entries = session.wishlist_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].variant_id().map(VariantId::as_str),
        Some("V2")
    );
    assert_eq!(ctx.state.server_wishlist("guest-siblings").len(), 1);
}

#[tokio::test]
async fn test_remove_without_variant_id_clears_product() {
    let ctx = TestContext::new().await;
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_snapshot(snapshot(
            "P1",
            Some("V1"),
            VariantSelection::from_options(Some("M"), None),
        ))
        .await
        .expect("save P1/V1");
    session
        .save_snapshot(snapshot(
            "P1",
            Some("V2"),
            VariantSelection::from_options(Some("L"), None),
        ))
        .await
        .expect("save P1/V2");
    session
        .save_reference(ProductId::new("P2"))
        .await
        .expect("save P2");

    session
        .remove_saved(&ProductId::new("P1"), None)
        .await
        .expect("remove all of P1");

    let entries = session.wishlist_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].product_id().as_str(), "P2");
}

#[tokio::test]
async fn test_clear_wishlist() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-clear-wl");
    let session = ctx.session();
    session.hydrate().await;

    session
        .save_reference(ProductId::new("P1"))
        .await
        .expect("save P1");
    session
        .save_reference(ProductId::new("P2"))
        .await
        .expect("save P2");

    session.clear_wishlist().await.expect("clear");

    assert_eq!(session.saved_count(), 0);
    assert!(ctx.state.server_wishlist("guest-clear-wl").is_empty());
}

#[tokio::test]
async fn test_failing_wishlist_read_hydrates_empty() {
    let ctx = TestContext::new().await;
    ctx.state.fail_reads.store(true, Ordering::SeqCst);

    let session = ctx.session();
    session.hydrate().await;

    assert_eq!(session.saved_count(), 0);
    assert!(!session.is_saved(
        &ProductId::new("P1"),
        &VariantSelection::none(),
        None
    ));
}
