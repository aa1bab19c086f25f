//! Row selection for bulk actions.

use std::collections::BTreeSet;

use certportal_core::{CertificateId, Entity};

/// Set of selected certificate ids, scoped to one dashboard shell.
///
/// # Invariants
/// - After [`SelectionSet::retain_loaded`], every member refers to a record
///   in the collection it was pruned against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<CertificateId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether `id` is
    /// selected afterwards.
    pub fn toggle(&mut self, id: &CertificateId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    /// Replace the selection with exactly the given (visible) records.
    pub fn select_all<'a, E, I>(&mut self, visible: I)
    where
        E: Entity<Id = CertificateId> + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        self.ids = visible.into_iter().map(|e| e.id().clone()).collect();
    }

    /// Whether every visible record is selected (and there is at least one).
    pub fn covers<'a, E, I>(&self, visible: I) -> bool
    where
        E: Entity<Id = CertificateId> + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        let mut any = false;
        for e in visible {
            any = true;
            if !self.ids.contains(e.id()) {
                return false;
            }
        }
        any
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that no longer refer to a loaded record. Returns how many
    /// were pruned.
    pub fn retain_loaded<E>(&mut self, collection: &[E]) -> usize
    where
        E: Entity<Id = CertificateId>,
    {
        let before = self.ids.len();
        let loaded: BTreeSet<&CertificateId> = collection.iter().map(Entity::id).collect();
        self.ids.retain(|id| loaded.contains(id));
        before - self.ids.len()
    }

    pub fn contains(&self, id: &CertificateId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CertificateId> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<CertificateId> {
        self.ids.iter().cloned().collect()
    }
}
