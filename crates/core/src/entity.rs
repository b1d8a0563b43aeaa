//! Entity trait: identity that survives state changes.

/// Entity marker + minimal interface.
///
/// A costing variant keeps its identity while its formulas, quantity and
/// totals change; a clone of it is a different entity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
