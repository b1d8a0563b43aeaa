use serde::{Deserialize, Serialize};

use printerp_core::{AggregateId, ValueObject};

/// Finished product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Snapshot of a finished product returned by the lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedProduct {
    pub id: ProductId,
    pub name: String,
    /// `None` when the catalog entry carries no explicit exemption flag.
    pub is_vat_exempt: Option<bool>,
    /// Pre-formatted size text (e.g. "A4 210 x 297 mm").
    pub dimensions_display: Option<String>,
}

impl ValueObject for FinishedProduct {}

impl FinishedProduct {
    pub fn new(id: ProductId, name: impl Into<String>, is_vat_exempt: Option<bool>) -> Self {
        Self {
            id,
            name: name.into(),
            is_vat_exempt,
            dimensions_display: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions_display = Some(dimensions.into());
        self
    }

    /// Label shown in pickers: name plus dimensions when known.
    pub fn display_label(&self) -> String {
        match &self.dimensions_display {
            Some(dims) if !dims.trim().is_empty() => format!("{} ({})", self.name, dims),
            _ => self.name.clone(),
        }
    }
}

/// Tax percentage a product binding seeds into a costing variant.
///
/// Exempt products force 0%; anything else gets the configured default.
pub fn default_tax_percent(product: &FinishedProduct, configured_default: f64) -> f64 {
    match product.is_vat_exempt {
        Some(true) => 0.0,
        _ => configured_default,
    }
}

/// Lookup contract for the finished product catalog.
pub trait FinishedProductLookup {
    /// Resolve a product by identifier.
    fn find(&self, id: ProductId) -> Option<FinishedProduct>;

    /// Free-text search (typeahead). Returns at most `limit` products.
    fn search(&self, query: &str, limit: usize) -> Vec<FinishedProduct>;
}

/// Catalog held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Vec<FinishedProduct>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product (matched by id).
    pub fn upsert(&mut self, product: FinishedProduct) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => self.products.push(product),
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl FromIterator<FinishedProduct> for InMemoryCatalog {
    fn from_iter<T: IntoIterator<Item = FinishedProduct>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for product in iter {
            catalog.upsert(product);
        }
        catalog
    }
}

impl FinishedProductLookup for InMemoryCatalog {
    fn find(&self, id: ProductId) -> Option<FinishedProduct> {
        let found = self.products.iter().find(|p| p.id == id).cloned();
        if found.is_none() {
            tracing::debug!(product_id = %id, "finished product not found");
        }
        found
    }

    fn search(&self, query: &str, limit: usize) -> Vec<FinishedProduct> {
        let needle = query.trim().to_lowercase();
        self.products
            .iter()
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }
}
