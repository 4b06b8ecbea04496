//! Cache key definitions.
//!
//! Defines `Fingerprint` for store digests and `Namespaces` for the set of
//! property namespaces a context type reads.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Namespace shared by every context type.
pub const ROOT_NAMESPACE: &str = "Context";

/// 64-bit digest of a store restricted to one type's namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Set of namespaces relevant to one context type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces(Arc<BTreeSet<&'static str>>);

impl Namespaces {
    pub fn contains(&self, namespace: &str) -> bool {
        self.0.contains(namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<&'static str> for Namespaces {
    fn from_iter<I: IntoIterator<Item = &'static str>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_displays_as_fixed_width_hex() {
        assert_eq!(Fingerprint::new(0xbeef).to_string(), "000000000000beef");
    }

    #[test]
    fn namespaces_deduplicate() {
        let namespaces: Namespaces = ["Serializer", "Context", "Serializer"].into_iter().collect();
        assert_eq!(namespaces.len(), 2);
        assert!(namespaces.contains("Serializer"));
        assert!(!namespaces.contains("Parser"));
    }
}
