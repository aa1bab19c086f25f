//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Collections keyed by identity (selection sets, optimistic list removal)
/// only need this much of a record.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
