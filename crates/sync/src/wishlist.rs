//! Local authoritative wishlist state.
//!
//! Entries come in two shapes: a bare *reference* for variant-less products,
//! and a *snapshot* that freezes the display data (name, price, image,
//! selected options) at save time, because the live catalog entry may later
//! change or vanish.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use driftwood_core::{Price, ProductId, VariantId, VariantSelection};

/// Frozen variant display data captured when the shopper saved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistSnapshot {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    #[serde(default, skip_serializing_if = "VariantSelection::is_empty")]
    pub selection: VariantSelection,
    pub name: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl WishlistSnapshot {
    /// Freeze the given variant data, stamped with the current time.
    #[must_use]
    pub fn capture(
        product_id: ProductId,
        variant_id: Option<VariantId>,
        selection: VariantSelection,
        name: impl Into<String>,
        price: Price,
        image: Option<String>,
    ) -> Self {
        Self {
            product_id,
            variant_id,
            selection,
            name: name.into(),
            price,
            image,
            captured_at: Utc::now(),
        }
    }
}

/// One saved wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistEntry {
    /// Bare pointer to a variant-less catalog product.
    Reference { product_id: ProductId },
    /// Frozen variant data captured at save time.
    Snapshot(WishlistSnapshot),
}

impl WishlistEntry {
    /// The product this entry refers to.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        match self {
            Self::Reference { product_id } => product_id,
            Self::Snapshot(snapshot) => &snapshot.product_id,
        }
    }

    /// The saved variant id, when the entry is a snapshot that carries one.
    #[must_use]
    pub fn variant_id(&self) -> Option<&VariantId> {
        match self {
            Self::Reference { .. } => None,
            Self::Snapshot(snapshot) => snapshot.variant_id.as_ref(),
        }
    }

    /// Normalized dimension map; empty for references.
    fn dimensions(&self) -> BTreeMap<String, String> {
        match self {
            Self::Reference { .. } => BTreeMap::new(),
            Self::Snapshot(snapshot) => snapshot.selection.merged_dimensions(),
        }
    }

    /// Whether this entry blocks saving the described target again.
    ///
    /// Matches if (a) both sides carry a variant id and they are equal, or
    /// (b) their normalized dimension maps are equal key-by-key, or (c) both
    /// are bare references to the same variant-less product.
    fn matches(
        &self,
        product_id: &ProductId,
        dimensions: &BTreeMap<String, String>,
        variant_id: Option<&VariantId>,
    ) -> bool {
        if self.product_id() != product_id {
            return false;
        }

        // (a) variant id equality
        if let (Some(held), Some(target)) = (self.variant_id(), variant_id)
            && held == target
        {
            return true;
        }

        match self {
            // (c) bare reference vs variant-less target
            Self::Reference { .. } => variant_id.is_none() && dimensions.is_empty(),
            // (b) dimension map equality
            Self::Snapshot(_) => self.dimensions() == *dimensions,
        }
    }
}

/// In-memory list of wishlist entries.
#[derive(Debug, Default)]
pub struct WishlistStore {
    entries: Vec<WishlistEntry>,
}

impl WishlistStore {
    /// Create an empty wishlist.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The current entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.entries
    }

    /// Number of saved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a bare reference, unless an entry for the product blocks it.
    ///
    /// Only valid for products with no variant dimensions; the caller owns
    /// that check since the store has no catalog knowledge. Returns whether
    /// the entry was added.
    pub fn add_reference(&mut self, product_id: ProductId) -> bool {
        if self.contains(&product_id, &VariantSelection::none(), None) {
            return false;
        }
        self.entries.push(WishlistEntry::Reference { product_id });
        true
    }

    /// Append a snapshot entry, unless a matching one already exists.
    ///
    /// Returns whether the entry was added.
    pub fn add_snapshot(&mut self, snapshot: WishlistSnapshot) -> bool {
        let dimensions = snapshot.selection.merged_dimensions();
        let blocked = self.entries.iter().any(|entry| {
            entry.matches(
                &snapshot.product_id,
                &dimensions,
                snapshot.variant_id.as_ref(),
            )
        });
        if blocked {
            return false;
        }
        self.entries.push(WishlistEntry::Snapshot(snapshot));
        true
    }

    /// Remove saved entries for a product.
    ///
    /// With a variant id, only snapshot entries for that product+variant are
    /// removed; without one, every entry for the product goes (all variants
    /// and the bare reference).
    pub fn remove(&mut self, product_id: &ProductId, variant_id: Option<&VariantId>) {
        match variant_id {
            Some(variant_id) => self.entries.retain(|entry| {
                entry.product_id() != product_id || entry.variant_id() != Some(variant_id)
            }),
            None => self.entries.retain(|entry| entry.product_id() != product_id),
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole list with canonical server state, deduped.
    pub fn replace_all(&mut self, entries: Vec<WishlistEntry>) {
        self.entries.clear();
        for entry in entries {
            match entry {
                WishlistEntry::Reference { product_id } => {
                    self.add_reference(product_id);
                }
                WishlistEntry::Snapshot(snapshot) => {
                    self.add_snapshot(snapshot);
                }
            }
        }
    }

    /// Is the described target already saved?
    ///
    /// Reused by the UI to answer "is the currently selected variant on the
    /// wishlist?" for the heart toggle.
    #[must_use]
    pub fn contains(
        &self,
        product_id: &ProductId,
        selection: &VariantSelection,
        variant_id: Option<&VariantId>,
    ) -> bool {
        let dimensions = selection.merged_dimensions();
        self.entries
            .iter()
            .any(|entry| entry.matches(product_id, &dimensions, variant_id))
    }
}
