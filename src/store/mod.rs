//! Configuration store.
//!
//! A [`PropertyStore`] is an immutable, structurally comparable bag of named
//! values. Names take the form `Namespace.key`; the namespace decides which
//! context types a property is relevant to when fingerprinting.

mod value;

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::cache::{Fingerprint, Namespaces};
use crate::error::PropertyError;

pub use value::{FromPropertyValue, PropertyValue};

/// Longest rendering `PropertyStore::summary` produces before truncating.
const SUMMARY_LIMIT: usize = 512;

/// Namespace a property name belongs to: the text before the first `.`.
///
/// Names without a `.` belong to the empty namespace.
pub fn namespace_of(name: &str) -> &str {
    match name.split_once('.') {
        Some((namespace, _)) => namespace,
        None => "",
    }
}

/// Immutable configuration bag.
///
/// Cloning is cheap; the entries are shared behind an `Arc`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyStore {
    entries: Arc<BTreeMap<String, PropertyValue>>,
}

impl PropertyStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> PropertyStoreBuilder {
        PropertyStoreBuilder::new()
    }

    /// Start a builder seeded with this store's entries.
    pub fn to_builder(&self) -> PropertyStoreBuilder {
        PropertyStoreBuilder {
            entries: (*self.entries).clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.get(name)
    }

    /// Typed lookup. Absent properties are `Ok(None)`.
    pub fn get_as<V: FromPropertyValue>(&self, name: &str) -> Result<Option<V>, PropertyError> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(value) => V::from_property(value)
                .map(Some)
                .ok_or_else(|| PropertyError::type_mismatch(name, V::EXPECTED, value.kind())),
        }
    }

    pub fn get_or<V: FromPropertyValue>(&self, name: &str, default: V) -> Result<V, PropertyError> {
        Ok(self.get_as(name)?.unwrap_or(default))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Entries belonging to a single namespace.
    pub fn group<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PropertyValue)> + 'a {
        self.iter()
            .filter(move |(name, _)| namespace_of(name) == namespace)
    }

    /// Distinct namespaces present in this store.
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|name| namespace_of(name)).collect()
    }

    /// Digest of the entries whose namespace is in `namespaces`.
    ///
    /// Entries are visited in name order, so the result does not depend on
    /// insertion order. Entries outside `namespaces` never contribute.
    pub fn fingerprint(&self, namespaces: &Namespaces) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        for (name, value) in self.relevant(namespaces) {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        Fingerprint::new(hasher.finish())
    }

    /// Whether both stores hold the same entries within `namespaces`.
    ///
    /// Stores that are `relevant_eq` always have equal fingerprints for the
    /// same namespaces.
    pub fn relevant_eq(&self, other: &Self, namespaces: &Namespaces) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
            || self.relevant(namespaces).eq(other.relevant(namespaces))
    }

    /// Entries within `namespaces`, in name order.
    pub fn relevant<'a>(
        &'a self,
        namespaces: &'a Namespaces,
    ) -> impl Iterator<Item = (&'a str, &'a PropertyValue)> + 'a {
        self.iter()
            .filter(move |(name, _)| namespaces.contains(namespace_of(name)))
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.entries
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect::<JsonMap<_, _>>(),
        )
    }

    /// Compact one-line rendering for error messages.
    pub fn summary(&self) -> String {
        let mut rendered = self.to_json().to_string();
        if rendered.len() > SUMMARY_LIMIT {
            let mut cut = SUMMARY_LIMIT;
            while !rendered.is_char_boundary(cut) {
                cut -= 1;
            }
            rendered.truncate(cut);
            rendered.push_str("...");
        }
        rendered
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl fmt::Display for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for PropertyStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = PropertyStoreBuilder::new();
        for (name, value) in iter {
            builder.set(name, value);
        }
        builder.build()
    }
}

/// Mutable staging area for a [`PropertyStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStoreBuilder {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> &mut Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.entries.remove(name);
        self
    }

    /// Append to a list property, creating it when absent.
    pub fn add_to(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<&mut Self, PropertyError> {
        let name = name.into();
        let value = value.into();
        match self.entries.get_mut(&name) {
            None => {
                self.entries.insert(name, PropertyValue::List(vec![value]));
            }
            Some(PropertyValue::List(items)) => items.push(value),
            Some(PropertyValue::Set(items)) => {
                items.insert(value);
            }
            Some(other) => return Err(PropertyError::conflict(name, "add_to", other.kind())),
        }
        Ok(self)
    }

    /// Insert into a set property, creating it when absent.
    pub fn add_to_set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<&mut Self, PropertyError> {
        let name = name.into();
        let value = value.into();
        match self.entries.get_mut(&name) {
            None => {
                self.entries
                    .insert(name, PropertyValue::Set(BTreeSet::from([value])));
            }
            Some(PropertyValue::Set(items)) => {
                items.insert(value);
            }
            Some(other) => return Err(PropertyError::conflict(name, "add_to_set", other.kind())),
        }
        Ok(self)
    }

    /// Remove every occurrence of `value` from a list or set property.
    ///
    /// Removing from an absent property is a no-op.
    pub fn remove_from(
        &mut self,
        name: &str,
        value: &PropertyValue,
    ) -> Result<&mut Self, PropertyError> {
        match self.entries.get_mut(name) {
            None => {}
            Some(PropertyValue::List(items)) => items.retain(|item| item != value),
            Some(PropertyValue::Set(items)) => {
                items.remove(value);
            }
            Some(other) => return Err(PropertyError::conflict(name, "remove_from", other.kind())),
        }
        Ok(self)
    }

    /// Insert a key into a map property, creating it when absent.
    pub fn put_to(
        &mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<&mut Self, PropertyError> {
        let name = name.into();
        match self.entries.get_mut(&name) {
            None => {
                let entries = BTreeMap::from([(key.into(), value.into())]);
                self.entries.insert(name, PropertyValue::Map(entries));
            }
            Some(PropertyValue::Map(entries)) => {
                entries.insert(key.into(), value.into());
            }
            Some(other) => return Err(PropertyError::conflict(name, "put_to", other.kind())),
        }
        Ok(self)
    }

    /// Overlay every entry of `store`, replacing existing values.
    pub fn apply(&mut self, store: &PropertyStore) -> &mut Self {
        for (name, value) in store.iter() {
            self.entries.insert(name.to_string(), value.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.get(name)
    }

    pub fn build(&self) -> PropertyStore {
        PropertyStore {
            entries: Arc::new(self.entries.clone()),
        }
    }
}
