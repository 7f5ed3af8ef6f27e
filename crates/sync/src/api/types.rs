//! Wire types for the persistence service.
//!
//! The server is loose about shapes: an item's product may arrive as a
//! populated object or as a bare id string, prices and images may live on the
//! item or on the embedded product, and wishlist entries are distinguished by
//! the presence of a `snapshot` object. These types model that looseness as
//! tagged sums at the boundary; [`super::conversions`] folds every payload
//! into exactly one well-defined local shape before it reaches a store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use driftwood_core::ProductId;

use crate::cart::CartLineItem;

/// Response envelope for cart routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEnvelope {
    #[serde(default)]
    pub items: Vec<WireCartLine>,
    /// Refreshed guest token, when the server chose the body channel.
    #[serde(default)]
    pub guest_token: Option<String>,
}

/// One cart item as the server sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCartLine {
    pub product: WireProductRef,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

const fn default_quantity() -> u32 {
    1
}

/// A product field that may arrive populated or as a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireProductRef {
    Populated(WireProduct),
    Id(String),
}

impl WireProductRef {
    /// The product id regardless of shape.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Populated(product) => &product.id,
            Self::Id(id) => id,
        }
    }

    /// The populated product, when the server embedded one.
    #[must_use]
    pub const fn populated(&self) -> Option<&WireProduct> {
        match self {
            Self::Populated(product) => Some(product),
            Self::Id(_) => None,
        }
    }
}

/// An embedded catalog product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Response envelope for wishlist routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEnvelope {
    #[serde(default)]
    pub items: Vec<WireWishlistEntry>,
    #[serde(default)]
    pub guest_token: Option<String>,
}

/// One wishlist entry as the server sends it.
///
/// `snapshot` present means a frozen-variant entry; absent means a bare
/// reference to a variant-less product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWishlistEntry {
    pub product: WireProductRef,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub snapshot: Option<WireSnapshot>,
}

/// Frozen variant data on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Body for `POST /cart`: the full deduped line list.
#[derive(Debug, Serialize)]
pub struct CartWritePayload {
    pub items: Vec<CartLineItem>,
}

/// Body for `POST /wishlist`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistWritePayload {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<WireSnapshot>,
}
