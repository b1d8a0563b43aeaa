//! `printerp-core`: domain foundation building blocks.
//!
//! Pure primitives shared by the costing and product crates (no IO, no
//! storage, no transport).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ValidationErrors};
pub use id::AggregateId;
pub use value_object::ValueObject;
