//! Finished products as seen by costing (collaborator boundary).
//!
//! The catalog itself is owned elsewhere; this crate only defines the lookup
//! contract and the VAT defaults a product binding drives.

pub mod product;

pub use product::{
    FinishedProduct, FinishedProductLookup, InMemoryCatalog, ProductId, default_tax_percent,
};
