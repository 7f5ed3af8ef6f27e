//! Normalization of wire payloads into the flat local shapes.
//!
//! Every inbound item passes through here exactly once, so the stores only
//! ever see [`CartLineItem`] and [`WishlistEntry`] regardless of which shape
//! the server chose to send.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::warn;

use driftwood_core::{CurrencyCode, Price, ProductId, VariantId, VariantSelection};

use crate::cart::CartLineItem;
use crate::wishlist::{WishlistEntry, WishlistSnapshot};

use super::types::{WireCartLine, WireSnapshot, WireWishlistEntry};

/// Normalize a full cart payload, dropping lines that carry no stock.
pub fn cart_items_from_wire(lines: Vec<WireCartLine>) -> Vec<CartLineItem> {
    lines.into_iter().filter_map(cart_line_from_wire).collect()
}

/// Normalize one cart line into the flat local shape.
///
/// Missing name/price/image default from the embedded product when the
/// server populated one. Lines with a zero quantity are dropped, matching
/// the store invariant that no line exists below quantity 1.
pub fn cart_line_from_wire(line: WireCartLine) -> Option<CartLineItem> {
    if line.quantity == 0 {
        return None;
    }

    let product_id = ProductId::new(line.product.id());
    let product = line.product.populated();

    let name = line
        .name
        .or_else(|| product.and_then(|p| p.name.clone()))
        .unwrap_or_else(|| product_id.as_str().to_string());

    let amount = line.price.or_else(|| product.and_then(|p| p.price));
    let currency = line
        .currency_code
        .as_deref()
        .or_else(|| product.and_then(|p| p.currency_code.as_deref()));
    let price = resolve_price(&product_id, amount, currency);

    let image = line.image.or_else(|| product.and_then(|p| p.image.clone()));

    let selection = VariantSelection {
        size: line.size,
        color: line.color,
        dimensions: line.dimensions,
    };

    Some(CartLineItem::new(
        product_id,
        name,
        price,
        selection,
        image,
        line.quantity,
    ))
}

/// Normalize a full wishlist payload.
pub fn wishlist_entries_from_wire(entries: Vec<WireWishlistEntry>) -> Vec<WishlistEntry> {
    entries.into_iter().map(wishlist_entry_from_wire).collect()
}

/// Tag one wire entry as a snapshot or a bare reference.
pub fn wishlist_entry_from_wire(entry: WireWishlistEntry) -> WishlistEntry {
    let product_id = ProductId::new(entry.product.id());
    let product = entry.product.populated();

    let Some(snapshot) = entry.snapshot else {
        return WishlistEntry::Reference { product_id };
    };

    let variant_id = snapshot
        .variant_id
        .or(entry.variant_id)
        .map(VariantId::new);

    let name = snapshot
        .name
        .or_else(|| product.and_then(|p| p.name.clone()))
        .unwrap_or_else(|| product_id.as_str().to_string());

    let amount = snapshot.price.or_else(|| product.and_then(|p| p.price));
    let currency = snapshot
        .currency_code
        .as_deref()
        .or_else(|| product.and_then(|p| p.currency_code.as_deref()));
    let price = resolve_price(&product_id, amount, currency);

    let image = snapshot
        .image
        .or_else(|| product.and_then(|p| p.image.clone()));

    let selection = VariantSelection {
        size: snapshot.size,
        color: snapshot.color,
        dimensions: snapshot.dimensions,
    };

    WishlistEntry::Snapshot(WishlistSnapshot {
        product_id,
        variant_id,
        selection,
        name,
        price,
        image,
        captured_at: snapshot.captured_at.unwrap_or_else(Utc::now),
    })
}

/// Serialize a local snapshot for a wishlist write.
#[must_use]
pub fn snapshot_to_wire(snapshot: &WishlistSnapshot) -> WireSnapshot {
    WireSnapshot {
        variant_id: snapshot
            .variant_id
            .as_ref()
            .map(|v| v.as_str().to_string()),
        name: Some(snapshot.name.clone()),
        price: Some(snapshot.price.amount),
        currency_code: Some(snapshot.price.currency_code.code().to_string()),
        image: snapshot.image.clone(),
        size: snapshot.selection.size.clone(),
        color: snapshot.selection.color.clone(),
        dimensions: snapshot.selection.dimensions.clone(),
        captured_at: Some(snapshot.captured_at),
    }
}

/// Resolve an amount + currency code pair into a local price.
fn resolve_price(
    product_id: &ProductId,
    amount: Option<Decimal>,
    currency: Option<&str>,
) -> Price {
    let amount = amount.unwrap_or_else(|| {
        warn!(product_id = %product_id, "server item carries no price, defaulting to zero");
        Decimal::ZERO
    });
    let currency_code = match currency {
        Some(code) => CurrencyCode::from_code(code).unwrap_or_else(|| {
            warn!(product_id = %product_id, code, "unknown currency code, defaulting");
            CurrencyCode::default()
        }),
        None => CurrencyCode::default(),
    };
    Price::new(amount, currency_code)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn wire_line(value: serde_json::Value) -> WireCartLine {
        serde_json::from_value(value).unwrap()
    }

    fn wire_entry(value: serde_json::Value) -> WireWishlistEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_bare_id_product_normalizes() {
        let item = cart_line_from_wire(wire_line(json!({
            "product": "P1",
            "quantity": 2,
            "price": "12.50",
            "name": "Canvas Tote",
        })))
        .unwrap();

        assert_eq!(item.product_id.as_str(), "P1");
        assert_eq!(item.name, "Canvas Tote");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.price.amount, Decimal::new(1250, 2));
    }

    #[test]
    fn test_populated_product_fills_missing_fields() {
        let item = cart_line_from_wire(wire_line(json!({
            "product": {
                "id": "P1",
                "name": "Canvas Tote",
                "price": "12.50",
                "currencyCode": "EUR",
                "image": "https://cdn.example/p1.jpg",
            },
            "quantity": 1,
        })))
        .unwrap();

        assert_eq!(item.name, "Canvas Tote");
        assert_eq!(item.price.amount, Decimal::new(1250, 2));
        assert_eq!(item.price.currency_code, CurrencyCode::EUR);
        assert_eq!(item.image.as_deref(), Some("https://cdn.example/p1.jpg"));
    }

    #[test]
    fn test_line_fields_win_over_embedded_product() {
        let item = cart_line_from_wire(wire_line(json!({
            "product": { "id": "P1", "name": "Old Name", "price": "1.00" },
            "quantity": 1,
            "name": "New Name",
            "price": "2.00",
        })))
        .unwrap();

        assert_eq!(item.name, "New Name");
        assert_eq!(item.price.amount, Decimal::new(200, 2));
    }

    #[test]
    fn test_zero_quantity_line_is_dropped() {
        assert!(cart_line_from_wire(wire_line(json!({
            "product": "P1",
            "quantity": 0,
        })))
        .is_none());
    }

    #[test]
    fn test_missing_price_defaults_to_zero() {
        let item = cart_line_from_wire(wire_line(json!({
            "product": "P1",
            "quantity": 1,
        })))
        .unwrap();
        assert_eq!(item.price.amount, Decimal::ZERO);
    }

    #[test]
    fn test_selection_folds_into_variant_key() {
        let a = cart_line_from_wire(wire_line(json!({
            "product": "P1",
            "quantity": 1,
            "size": "M",
            "color": "red",
        })))
        .unwrap();
        let b = cart_line_from_wire(wire_line(json!({
            "product": "P1",
            "quantity": 1,
            "dimensions": { "color": "red", "size": "M" },
        })))
        .unwrap();

        assert_eq!(a.variant_key, b.variant_key);
    }

    #[test]
    fn test_entry_without_snapshot_is_reference() {
        let entry = wishlist_entry_from_wire(wire_entry(json!({
            "product": "P1",
        })));
        assert!(matches!(entry, WishlistEntry::Reference { ref product_id } if product_id.as_str() == "P1"));
    }

    #[test]
    fn test_entry_with_snapshot_is_tagged_snapshot() {
        let entry = wishlist_entry_from_wire(wire_entry(json!({
            "product": { "id": "P1", "name": "Canvas Tote" },
            "variantId": "V1",
            "snapshot": {
                "price": "45.00",
                "size": "M",
                "capturedAt": "2026-03-01T12:00:00Z",
            },
        })));

        let WishlistEntry::Snapshot(snapshot) = entry else {
            panic!("expected snapshot entry");
        };
        assert_eq!(snapshot.variant_id.unwrap().as_str(), "V1");
        assert_eq!(snapshot.name, "Canvas Tote");
        assert_eq!(snapshot.price.amount, Decimal::new(4500, 2));
        assert_eq!(
            snapshot.selection.size.as_deref(),
            Some("M")
        );
    }

    #[test]
    fn test_snapshot_round_trips_through_wire_shape() {
        let local = WishlistSnapshot::capture(
            ProductId::new("P1"),
            Some(VariantId::new("V1")),
            VariantSelection::from_options(Some("M"), Some("red")),
            "Canvas Tote",
            Price::new(Decimal::new(4500, 2), CurrencyCode::USD),
            Some("https://cdn.example/p1.jpg".to_string()),
        );

        let wire = snapshot_to_wire(&local);
        let back = wishlist_entry_from_wire(WireWishlistEntry {
            product: super::super::types::WireProductRef::Id("P1".to_string()),
            variant_id: None,
            snapshot: Some(wire),
        });

        assert_eq!(back, WishlistEntry::Snapshot(local));
    }
}
