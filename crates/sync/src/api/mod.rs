//! Remote reconciliation client for the persistence service.
//!
//! REST/JSON over `reqwest`. Reads are never allowed to block the UI: a
//! failed fetch yields an empty list. Writes send full state and return the
//! server's canonical, normalized response; callers keep their optimistic
//! local state when a write fails (no rollback) and converge on a later
//! round-trip.
//!
//! Every response - success or error - is inspected for a refreshed guest
//! token in the `X-Guest-Token` header or the `guestToken` body field.

pub mod conversions;
pub mod types;

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use driftwood_core::{ProductId, VariantId};

use crate::cart::{CartLineItem, merge_lines};
use crate::config::SyncConfig;
use crate::identity::{IdentityProvider, RequestIdentity};
use crate::wishlist::{WishlistEntry, WishlistSnapshot};

use conversions::{cart_items_from_wire, snapshot_to_wire, wishlist_entries_from_wire};
use types::{CartEnvelope, CartWritePayload, WishlistEnvelope, WishlistWritePayload};

/// Header carrying the guest token in both directions.
pub const GUEST_TOKEN_HEADER: &str = "x-guest-token";

/// Errors that can occur when talking to the persistence service.
///
/// A validation rejection is deliberately indistinct from any other
/// non-success status: either way the write did not update canonical state.
#[derive(Debug, Error)]
pub enum StoreApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Client for the cart/wishlist persistence service.
///
/// Cheaply cloneable; all clones share one connection pool and one identity
/// handle.
#[derive(Clone)]
pub struct StoreApiClient {
    inner: Arc<StoreApiClientInner>,
}

struct StoreApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    identity: IdentityProvider,
}

impl StoreApiClient {
    /// Create a new client scoped by the given identity handle.
    #[must_use]
    pub fn new(config: &SyncConfig, identity: IdentityProvider) -> Self {
        Self {
            inner: Arc::new(StoreApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_base_url.clone(),
                identity,
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    /// Send one request: attach the active identity, capture any refreshed
    /// guest token (header and body, on error responses too), and parse the
    /// body.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, StoreApiError> {
        let request = match self.inner.identity.current() {
            RequestIdentity::User(credential) => request.bearer_auth(credential.expose_secret()),
            RequestIdentity::Guest(token) => request.header(GUEST_TOKEN_HEADER, token.as_str()),
            RequestIdentity::Anonymous => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if let Some(token) = response
            .headers()
            .get(GUEST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.inner.identity.adopt_guest_token(token);
        }

        // Get the body as text first for better error diagnostics
        let body = response.text().await?;

        let value = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => value,
                Err(e) if status.is_success() => {
                    warn!(
                        error = %e,
                        body = %snippet(&body),
                        "failed to parse persistence service response"
                    );
                    return Err(e.into());
                }
                // Non-JSON error body; the status error below carries it.
                Err(_) => serde_json::Value::Null,
            }
        };

        if let Some(token) = value.get("guestToken").and_then(|v| v.as_str()) {
            self.inner.identity.adopt_guest_token(token);
        }

        if !status.is_success() {
            debug!(status = %status, body = %snippet(&body), "persistence service returned non-success status");
            return Err(StoreApiError::Api {
                status: status.as_u16(),
                message: snippet(&body),
            });
        }

        Ok(value)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the current identity's cart.
    ///
    /// Any failure yields an empty list - reads never block the UI, and
    /// absence of data reads as "nothing saved yet".
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Vec<CartLineItem> {
        match self.get_cart().await {
            Ok(items) => items,
            Err(e) => {
                warn!("failed to fetch cart, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    async fn get_cart(&self) -> Result<Vec<CartLineItem>, StoreApiError> {
        let value = self
            .execute(self.inner.client.get(self.endpoint("/cart")))
            .await?;
        parse_cart_state(value)
    }

    /// Push the full cart and adopt the server's canonical state.
    ///
    /// The list is merged/deduped before sending, so the server never
    /// receives duplicate lines even if a race produced them locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// parsed; the caller keeps its optimistic local state in that case.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn sync_cart(
        &self,
        items: Vec<CartLineItem>,
    ) -> Result<Vec<CartLineItem>, StoreApiError> {
        let items = merge_lines(items);
        let value = self
            .execute(
                self.inner
                    .client
                    .post(self.endpoint("/cart"))
                    .json(&CartWritePayload { items }),
            )
            .await?;
        parse_cart_state(value)
    }

    /// Delete the server cart and adopt the (expected empty) response.
    ///
    /// Failures yield an empty list; the cart was cleared locally either way.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Vec<CartLineItem> {
        let result = self
            .execute(self.inner.client.delete(self.endpoint("/cart")))
            .await
            .and_then(parse_cart_state);
        match result {
            Ok(items) => items,
            Err(e) => {
                warn!("failed to clear server cart: {e}");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Fetch the current identity's wishlist; empty on any failure.
    #[instrument(skip(self))]
    pub async fn fetch_wishlist(&self) -> Vec<WishlistEntry> {
        let result = self
            .execute(self.inner.client.get(self.endpoint("/wishlist")))
            .await
            .and_then(parse_wishlist_state);
        match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to fetch wishlist, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Save an entry and return the full canonical wishlist.
    ///
    /// A `None` snapshot saves a bare reference (variant-less product).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; this is a user-awaited write,
    /// so the failure is surfaced rather than swallowed.
    #[instrument(skip(self, snapshot), fields(product_id = %product_id))]
    pub async fn add_wishlist_item(
        &self,
        product_id: &ProductId,
        snapshot: Option<&WishlistSnapshot>,
    ) -> Result<Vec<WishlistEntry>, StoreApiError> {
        let payload = WishlistWritePayload {
            product_id: product_id.clone(),
            snapshot: snapshot.map(snapshot_to_wire),
        };
        let value = self
            .execute(
                self.inner
                    .client
                    .post(self.endpoint("/wishlist"))
                    .json(&payload),
            )
            .await?;
        parse_wishlist_state(value)
    }

    /// Remove entries for a product and return the full canonical wishlist.
    ///
    /// With a variant id, only that product+variant goes; without, every
    /// entry for the product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_wishlist_item(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Vec<WishlistEntry>, StoreApiError> {
        let mut request = self
            .inner
            .client
            .delete(self.endpoint(&format!("/wishlist/{product_id}")));
        if let Some(variant_id) = variant_id {
            request = request.query(&[("variantId", variant_id.as_str())]);
        }
        let value = self.execute(request).await?;
        parse_wishlist_state(value)
    }

    /// Empty the server wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> Result<Vec<WishlistEntry>, StoreApiError> {
        let value = self
            .execute(self.inner.client.delete(self.endpoint("/wishlist")))
            .await?;
        parse_wishlist_state(value)
    }
}

impl crate::scheduler::CartBackend for StoreApiClient {
    fn push_cart(
        &self,
        items: Vec<CartLineItem>,
    ) -> impl Future<Output = Result<Vec<CartLineItem>, StoreApiError>> + Send {
        self.sync_cart(items)
    }
}

/// Decode a cart envelope; an empty body means an empty cart.
fn parse_cart_state(value: serde_json::Value) -> Result<Vec<CartLineItem>, StoreApiError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let envelope: CartEnvelope = serde_json::from_value(value)?;
    Ok(cart_items_from_wire(envelope.items))
}

/// Decode a wishlist envelope; an empty body means an empty list.
fn parse_wishlist_state(value: serde_json::Value) -> Result<Vec<WishlistEntry>, StoreApiError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let envelope: WishlistEnvelope = serde_json::from_value(value)?;
    Ok(wishlist_entries_from_wire(envelope.items))
}

/// First 200 characters of a response body, for logs and error messages.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_cart_state_handles_empty_body() {
        assert!(parse_cart_state(serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_parse_cart_state_decodes_envelope() {
        let items = parse_cart_state(json!({
            "items": [{ "product": "P1", "quantity": 2, "price": "5.00" }],
        }))
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_parse_wishlist_state_tags_entries() {
        let entries = parse_wishlist_state(json!({
            "items": [
                { "product": "P1" },
                { "product": "P2", "snapshot": { "price": "9.99", "size": "M" } },
            ],
        }))
        .unwrap();

        assert!(matches!(entries[0], WishlistEntry::Reference { .. }));
        assert!(matches!(entries[1], WishlistEntry::Snapshot(_)));
    }

    #[test]
    fn test_api_error_display() {
        let err = StoreApiError::Api {
            status: 422,
            message: "invalid lines".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 422 - invalid lines");
    }
}
