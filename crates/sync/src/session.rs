//! The session facade the UI layer talks to.
//!
//! One cheaply-cloneable handle wires together the identity provider, the
//! local stores, the debounced scheduler, and the reconciliation client.
//! Cart mutations are optimistic and debounced; wishlist writes go to the
//! server directly, per action, and surface their failures since the shopper
//! is awaiting confirmation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;
use tracing::instrument;

use driftwood_core::{Price, ProductId, VariantId, VariantKey, VariantSelection};

use crate::api::{StoreApiClient, StoreApiError};
use crate::cart::{CartItemDraft, CartLineItem, CartStore};
use crate::config::SyncConfig;
use crate::identity::IdentityProvider;
use crate::scheduler::SyncScheduler;
use crate::wishlist::{WishlistEntry, WishlistSnapshot, WishlistStore};

/// A shopper's cart & wishlist session.
///
/// Cheaply cloneable via `Arc`; all clones share the same local state and
/// sync machinery.
#[derive(Clone)]
pub struct ShopSession {
    inner: Arc<ShopSessionInner>,
}

struct ShopSessionInner {
    cart: Arc<Mutex<CartStore>>,
    wishlist: Mutex<WishlistStore>,
    api: StoreApiClient,
    identity: IdentityProvider,
    scheduler: SyncScheduler<StoreApiClient>,
}

impl ShopSession {
    /// Create a session from configuration.
    ///
    /// The durable guest token (if any) is loaded here; call
    /// [`hydrate`](Self::hydrate) to pull server state.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        let identity = IdentityProvider::new(config.guest_token_file.clone());
        let api = StoreApiClient::new(config, identity.clone());
        let cart = Arc::new(Mutex::new(CartStore::new()));
        let scheduler = SyncScheduler::new(api.clone(), Arc::clone(&cart), config.debounce);

        Self {
            inner: Arc::new(ShopSessionInner {
                cart,
                wishlist: Mutex::new(WishlistStore::new()),
                api,
                identity,
                scheduler,
            }),
        }
    }

    /// Hydrate both stores from the server for the active identity.
    ///
    /// Used on load and after an identity change. Failed fetches hydrate
    /// empty rather than erroring.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) {
        let items = self.inner.api.fetch_cart().await;
        self.cart().replace_all(items);
        self.inner.scheduler.record_synced();

        let entries = self.inner.api.fetch_wishlist().await;
        self.wishlist().replace_all(entries);
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add an item to the cart (optimistic, debounced).
    pub fn add_to_cart(&self, draft: CartItemDraft, quantity: u32) {
        self.cart().add(draft.into_line(quantity));
        self.inner.scheduler.schedule();
    }

    /// Set a line's quantity; below 1 removes the line.
    pub fn update_quantity(&self, key: &VariantKey, quantity: u32) {
        self.cart().update_quantity(key, quantity);
        self.inner.scheduler.schedule();
    }

    /// Remove a line from the cart.
    pub fn remove_from_cart(&self, key: &VariantKey) {
        self.cart().remove(key);
        self.inner.scheduler.schedule();
    }

    /// Empty the cart locally and on the server.
    ///
    /// The server delete is best-effort: its (expected empty) response is
    /// adopted, and a failure still leaves the local cart empty.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        self.cart().clear();
        let canonical = self.inner.api.clear_cart().await;
        self.cart().replace_all(canonical);
        self.inner.scheduler.record_synced();
    }

    /// Push the cart immediately, bypassing the debounce window.
    ///
    /// For callers that need a guaranteed flush (e.g. right before
    /// checkout).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; local state is kept as-is.
    pub async fn flush_cart(&self) -> Result<(), StoreApiError> {
        self.inner.scheduler.flush().await
    }

    /// The current cart lines.
    #[must_use]
    pub fn cart_items(&self) -> Vec<CartLineItem> {
        self.cart().items().to_vec()
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.cart().total_quantity()
    }

    /// Sum of `price × quantity` across the cart.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.cart().total_price()
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Save a bare reference to a variant-less product.
    ///
    /// No-op if the product is already saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the server write fails; the optimistic local
    /// entry is kept and converges on the next round-trip.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn save_reference(&self, product_id: ProductId) -> Result<(), StoreApiError> {
        if !self.wishlist().add_reference(product_id.clone()) {
            return Ok(());
        }
        let canonical = self.inner.api.add_wishlist_item(&product_id, None).await?;
        self.wishlist().replace_all(canonical);
        Ok(())
    }

    /// Save a frozen variant snapshot.
    ///
    /// No-op if a matching entry (by variant id or equivalent dimension map)
    /// is already saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the server write fails; the optimistic local
    /// entry is kept.
    #[instrument(skip(self, snapshot))]
    pub async fn save_snapshot(&self, snapshot: WishlistSnapshot) -> Result<(), StoreApiError> {
        let product_id = snapshot.product_id.clone();
        if !self.wishlist().add_snapshot(snapshot.clone()) {
            return Ok(());
        }
        let canonical = self
            .inner
            .api
            .add_wishlist_item(&product_id, Some(&snapshot))
            .await?;
        self.wishlist().replace_all(canonical);
        Ok(())
    }

    /// Remove saved entries for a product.
    ///
    /// With a variant id only that variant goes; without, everything saved
    /// for the product.
    ///
    /// # Errors
    ///
    /// Returns an error if the server write fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_saved(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<(), StoreApiError> {
        self.wishlist().remove(product_id, variant_id);
        let canonical = self
            .inner
            .api
            .remove_wishlist_item(product_id, variant_id)
            .await?;
        self.wishlist().replace_all(canonical);
        Ok(())
    }

    /// Empty the wishlist locally and on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server write fails.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> Result<(), StoreApiError> {
        self.wishlist().clear();
        let canonical = self.inner.api.clear_wishlist().await?;
        self.wishlist().replace_all(canonical);
        Ok(())
    }

    /// Is the described product/variant already saved?
    #[must_use]
    pub fn is_saved(
        &self,
        product_id: &ProductId,
        selection: &VariantSelection,
        variant_id: Option<&VariantId>,
    ) -> bool {
        self.wishlist().contains(product_id, selection, variant_id)
    }

    /// The current wishlist entries.
    #[must_use]
    pub fn wishlist_entries(&self) -> Vec<WishlistEntry> {
        self.wishlist().entries().to_vec()
    }

    /// Number of saved wishlist entries.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.wishlist().len()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Hand off from guest to signed-in shopper and re-hydrate.
    ///
    /// The credential itself comes from the external auth collaborator; this
    /// engine only swaps the active identity and pulls the account's state.
    #[instrument(skip(self, credential))]
    pub async fn sign_in(&self, credential: SecretString) {
        self.inner.identity.set_credential(credential);
        self.hydrate().await;
    }

    /// Drop the session credential and re-hydrate as the guest.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        self.inner.identity.clear_credential();
        self.hydrate().await;
    }

    /// Whether a signed-in credential is active.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.identity.has_credential()
    }

    /// Drop any pending debounce timer without a final flush.
    ///
    /// Call on teardown; use [`flush_cart`](Self::flush_cart) first when the
    /// pending state must reach the server.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }

    fn cart(&self) -> MutexGuard<'_, CartStore> {
        self.inner
            .cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wishlist(&self) -> MutexGuard<'_, WishlistStore> {
        self.inner
            .wishlist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
