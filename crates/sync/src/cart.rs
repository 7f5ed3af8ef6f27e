//! Local authoritative cart state.
//!
//! The store is the optimistic source of truth between syncs: UI mutations
//! land here synchronously, and the scheduler later pushes the whole line
//! list to the persistence service. Lines are unique by variant key, and the
//! derived aggregates are recomputed from the line list after every mutation
//! rather than maintained incrementally.

use serde::{Deserialize, Serialize};

use driftwood_core::{CurrencyCode, Price, ProductId, VariantKey, VariantSelection};

/// One cart line: a product variant and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Identity of this line within the cart.
    pub variant_key: VariantKey,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price; the line total is `price × quantity`.
    pub price: Price,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "VariantSelection::is_empty")]
    pub selection: VariantSelection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartLineItem {
    /// Build a line, computing its variant key from product and selection.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        price: Price,
        selection: VariantSelection,
        image: Option<String>,
        quantity: u32,
    ) -> Self {
        let variant_key = VariantKey::for_selection(&product_id, &selection);
        Self {
            variant_key,
            product_id,
            name: name.into(),
            price,
            quantity,
            selection,
            image,
        }
    }
}

/// Product data the UI hands over when adding to the cart.
///
/// The quantity travels separately so repeated adds of the same draft merge
/// into one line.
#[derive(Debug, Clone)]
pub struct CartItemDraft {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub selection: VariantSelection,
    pub image: Option<String>,
}

impl CartItemDraft {
    /// Turn the draft into a cart line with the given quantity.
    #[must_use]
    pub fn into_line(self, quantity: u32) -> CartLineItem {
        CartLineItem::new(
            self.product_id,
            self.name,
            self.price,
            self.selection,
            self.image,
            quantity,
        )
    }
}

/// Collapse lines resolving to the same variant key, summing quantities.
///
/// First-seen order is preserved; lines whose quantity is zero are dropped.
/// Applied before any state is accepted locally or sent to the server, so a
/// race that produced duplicate lines can never reach either side.
#[must_use]
pub fn merge_lines(lines: Vec<CartLineItem>) -> Vec<CartLineItem> {
    let mut merged: Vec<CartLineItem> = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity == 0 {
            continue;
        }
        match merged.iter_mut().find(|m| m.variant_key == line.variant_key) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }

    merged
}

/// In-memory authoritative list of cart lines plus derived aggregates.
#[derive(Debug)]
pub struct CartStore {
    items: Vec<CartLineItem>,
    total_quantity: u32,
    total_price: Price,
}

impl CartStore {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            total_quantity: 0,
            total_price: Price::zero(CurrencyCode::USD),
        }
    }

    /// The current lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Total number of units across all lines.
    #[must_use]
    pub const fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    /// Sum of `price × quantity` across all lines.
    #[must_use]
    pub const fn total_price(&self) -> Price {
        self.total_price
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a line; a line with the same variant key has its quantity
    /// incremented instead. Zero-quantity adds are ignored.
    pub fn add(&mut self, item: CartLineItem) {
        if item.quantity == 0 {
            return;
        }
        match self
            .items
            .iter_mut()
            .find(|line| line.variant_key == item.variant_key)
        {
            Some(existing) => existing.quantity += item.quantity,
            None => self.items.push(item),
        }
        self.recompute();
    }

    /// Set a line's quantity; anything below 1 removes the line.
    pub fn update_quantity(&mut self, key: &VariantKey, quantity: u32) {
        if quantity == 0 {
            self.remove(key);
            return;
        }
        if let Some(line) = self.items.iter_mut().find(|line| &line.variant_key == key) {
            line.quantity = quantity;
        }
        self.recompute();
    }

    /// Remove the line with the given variant key, if present.
    pub fn remove(&mut self, key: &VariantKey) {
        self.items.retain(|line| &line.variant_key != key);
        self.recompute();
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    /// Replace the whole cart with canonical server state.
    ///
    /// The only operation allowed to reorder, shrink, or grow the list
    /// arbitrarily. The input is merged/deduped before it is accepted.
    pub fn replace_all(&mut self, items: Vec<CartLineItem>) {
        self.items = merge_lines(items);
        self.recompute();
    }

    /// Aggregates are derived from the line list after every mutation,
    /// never cached independently of it.
    fn recompute(&mut self) {
        self.total_quantity = self.items.iter().map(|line| line.quantity).sum();

        let currency = self
            .items
            .first()
            .map_or(CurrencyCode::USD, |line| line.price.currency_code);
        let amount = self
            .items
            .iter()
            .map(|line| line.price.times(line.quantity).amount)
            .sum();
        self.total_price = Price::new(amount, currency);
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}
