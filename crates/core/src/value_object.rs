//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Computed totals, document links and product snapshots are compared by
/// their attribute values. To "change" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Totals { sub_total: f64, total: f64 }
///
/// impl ValueObject for Totals {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
