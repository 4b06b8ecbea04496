//! Per-type namespace registry.
//!
//! Tracks the set of property namespaces each context type reads, so the
//! object cache can fingerprint only the relevant part of a store.

use std::any::TypeId;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use super::keys::{Namespaces, ROOT_NAMESPACE};
use crate::context::Context;

/// Identity of a context type as the cache sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextType {
    pub id: TypeId,
    pub name: &'static str,
    pub lineage: &'static [&'static str],
}

impl ContextType {
    pub fn of<T: Context>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::TYPE_NAME,
            lineage: T::lineage(),
        }
    }

    /// Own name, declared lineage and the root namespace, deduplicated.
    pub fn relevant_namespaces(&self) -> Namespaces {
        std::iter::once(self.name)
            .chain(self.lineage.iter().copied())
            .chain(std::iter::once(ROOT_NAMESPACE))
            .collect()
    }
}

/// Maps context types to their relevant namespaces.
///
/// Entries are computed on first request and never change afterwards.
/// Concurrent first requests may both compute; the first insert wins and the
/// other result is dropped.
pub struct NamespaceRegistry {
    sets: DashMap<TypeId, Namespaces>,
}

impl NamespaceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sets: DashMap::new(),
        }
    }

    /// Get the namespaces for a context type, computing them on first use.
    pub fn namespaces_for(&self, context_type: &ContextType) -> Namespaces {
        if let Some(found) = self.sets.get(&context_type.id) {
            return found.value().clone();
        }

        let computed = context_type.relevant_namespaces();

        match self.sets.entry(context_type.id) {
            Entry::Occupied(occupied) => {
                trace!(
                    context_type = context_type.name,
                    outcome = "race_discarded",
                    "namespace set already published"
                );
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(computed).value().clone(),
        }
    }

    /// Get the number of types with a computed namespace set.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Clear all namespace sets.
    pub fn clear(&self) {
        self.sets.clear();
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
