//! Identity-scoping tests: guest token capture and the bearer hand-off.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use std::sync::atomic::Ordering;

use driftwood_core::{CurrencyCode, Price, ProductId, VariantSelection};
use driftwood_integration_tests::TestContext;
use driftwood_sync::CartItemDraft;

fn draft(product: &str) -> CartItemDraft {
    CartItemDraft {
        product_id: ProductId::new(product),
        name: format!("{product} name"),
        price: Price::new(Decimal::new(1000, 2), CurrencyCode::USD),
        selection: VariantSelection::none(),
        image: None,
    }
}

#[tokio::test]
async fn test_server_minted_token_is_captured_and_replayed() {
    let ctx = TestContext::new().await;
    let session = ctx.session();

    // First contact: no token on the first request, server mints one.
    session.hydrate().await;

    let token = ctx.persisted_token().expect("minted token persisted");
    assert!(token.starts_with("guest-"));

    let requests = ctx.state.requests();
    assert!(requests[0].guest_token.is_none(), "nothing to send yet");
    // The captured token rides on every subsequent request.
    assert_eq!(requests[1].guest_token.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn test_token_delivered_via_body_field_is_captured() {
    let ctx = TestContext::new().await;
    ctx.state.mint_in_body_only.store(true, Ordering::SeqCst);

    let session = ctx.session();
    session.hydrate().await;

    let token = ctx.persisted_token().expect("body-channel token persisted");
    assert!(token.starts_with("guest-"));
}

#[tokio::test]
async fn test_token_is_captured_from_error_responses() {
    let ctx = TestContext::new().await;
    ctx.state.fail_reads.store(true, Ordering::SeqCst);

    let session = ctx.session();
    session.hydrate().await;

    // The reads failed (and hydrated empty), but the refreshed token on the
    // error response was still captured.
    assert!(session.cart_items().is_empty());
    assert!(ctx.persisted_token().is_some());
}

#[tokio::test]
async fn test_persisted_token_scopes_a_later_visit() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-returning");
    ctx.state.seed_cart(
        "guest-returning",
        vec![json!({ "product": "P1", "quantity": 3, "price": "10.00" })],
    );

    let session = ctx.session();
    session.hydrate().await;

    assert_eq!(session.total_quantity(), 3);
}

#[tokio::test]
async fn test_bearer_credential_suppresses_guest_header() {
    let ctx = TestContext::new().await;
    ctx.seed_guest_token("guest-before-login");

    let session = ctx.session();
    session.hydrate().await;
    session.sign_in(SecretString::from("session-abc")).await;

    let requests = ctx.state.requests();
    let signed_in: Vec<_> = requests
        .iter()
        .filter(|r| r.bearer.as_deref() == Some("session-abc"))
        .collect();
    assert!(!signed_in.is_empty(), "sign-in re-hydrates over the bearer");
    assert!(
        signed_in.iter().all(|r| r.guest_token.is_none()),
        "credential suppresses the guest header"
    );
}

#[tokio::test]
async fn test_sign_in_hands_off_to_account_state() {
    let ctx = TestContext::new().await;
    ctx.state.seed_cart(
        "user:session-abc",
        vec![json!({
            "product": { "id": "P9", "name": "Account Item", "price": "99.00" },
            "quantity": 1,
        })],
    );

    let session = ctx.session();
    session.hydrate().await;
    assert!(session.cart_items().is_empty());

    session.sign_in(SecretString::from("session-abc")).await;
    assert!(session.is_signed_in());

    let items = session.cart_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Account Item");

    // Signing out swaps back to the guest's (empty) state.
    session.sign_out().await;
    assert!(!session.is_signed_in());
    assert!(session.cart_items().is_empty());
}

#[tokio::test]
async fn test_signed_in_mutations_write_to_account_cart() {
    let ctx = TestContext::new().await;
    let session = ctx.session();
    session.hydrate().await;
    session.sign_in(SecretString::from("session-xyz")).await;

    session.add_to_cart(draft("P1"), 2);
    ctx.settle().await;

    let account_cart = ctx.state.server_cart("user:session-xyz");
    assert_eq!(account_cart.len(), 1);
    assert_eq!(account_cart[0]["quantity"], 2);
}
