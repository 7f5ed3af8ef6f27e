//! Variant selection and deterministic variant key generation.
//!
//! The variant key is the unit of identity for cart-line merging and
//! wishlist dedup: one product plus one combination of selected options maps
//! to exactly one key, regardless of the order options were chosen in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// The options a shopper selected for a product.
///
/// Size and color get dedicated fields because the product pages expose
/// dedicated pickers for them; free-form option dimensions (material, finish,
/// monogram, ...) travel in `dimensions`. All three fold into a single
/// dimension namespace when computing identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariantSelection {
    /// Selected size, if the product has sizes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Selected color, if the product has colors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Named option dimensions beyond size and color.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, String>,
}

impl VariantSelection {
    /// A selection with no dimensions at all (variant-less product).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a selection from a size and/or color picker.
    #[must_use]
    pub fn from_options(size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            size: size.map(ToString::to_string),
            color: color.map(ToString::to_string),
            dimensions: BTreeMap::new(),
        }
    }

    /// Add a named option dimension, returning the selection for chaining.
    #[must_use]
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    /// Whether the shopper selected no options at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.color.is_none() && self.dimensions.is_empty()
    }

    /// The canonical, normalized dimension map for this selection.
    ///
    /// Size and color fold into the map under the `size` and `color` names,
    /// taking precedence over same-named entries in `dimensions`. Dimension
    /// names are trimmed and ASCII-lowercased, values trimmed; entries with
    /// an empty name or value are dropped. The resulting `BTreeMap` iterates
    /// in sorted order, so two selections describing the same variant yield
    /// the same map no matter how their call sites were ordered.
    #[must_use]
    pub fn merged_dimensions(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();

        for (name, value) in &self.dimensions {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if !name.is_empty() && !value.is_empty() {
                merged.insert(name, value.to_string());
            }
        }

        // Dedicated pickers are the source of truth for size and color.
        if let Some(size) = self.size.as_deref().map(str::trim)
            && !size.is_empty()
        {
            merged.insert("size".to_string(), size.to_string());
        }
        if let Some(color) = self.color.as_deref().map(str::trim)
            && !color.is_empty()
        {
            merged.insert("color".to_string(), color.to_string());
        }

        merged
    }
}

/// Deterministic identity for a product + selected-options combination.
///
/// Products with no variant dimensions use the product id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantKey(String);

impl VariantKey {
    /// Compute the key for a product and selection.
    #[must_use]
    pub fn for_selection(product_id: &ProductId, selection: &VariantSelection) -> Self {
        let dimensions = selection.merged_dimensions();
        if dimensions.is_empty() {
            return Self(product_id.as_str().to_string());
        }

        let options = dimensions
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("|");

        Self(format!("{product_id}::{options}"))
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
