use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono_tz::Tz;
use mime_guess::Mime;

use super::Context;
use super::settings::{CONTEXT_DEBUG, CONTEXT_LOCALE, CONTEXT_MEDIA_TYPE, CONTEXT_TIME_ZONE, Locale};
use crate::cache::{ObjectCache, global_cache};
use crate::error::{ContextError, CreateError, PropertyError};
use crate::store::{PropertyStore, PropertyStoreBuilder, PropertyValue};

/// Stages property overrides and resolves a `T` from them.
///
/// Building twice from equivalent properties yields the same instance.
pub struct ContextBuilder<T> {
    properties: PropertyStoreBuilder,
    cache: Option<Arc<ObjectCache>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Context> ContextBuilder<T> {
    pub fn new() -> Self {
        Self {
            properties: PropertyStoreBuilder::new(),
            cache: None,
            _marker: PhantomData,
        }
    }

    pub fn from_store(store: &PropertyStore) -> Self {
        Self {
            properties: store.to_builder(),
            cache: None,
            _marker: PhantomData,
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.set(name, value);
        self
    }

    pub fn remove(mut self, name: &str) -> Self {
        self.properties.remove(name);
        self
    }

    /// Append to the list property `name`.
    pub fn add_to(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<Self, PropertyError> {
        self.properties.add_to(name, value)?;
        Ok(self)
    }

    /// Insert `key` into the map property `name`.
    pub fn put_to(
        mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<Self, PropertyError> {
        self.properties.put_to(name, key, value)?;
        Ok(self)
    }

    /// Overlay every entry of `store`.
    pub fn apply(mut self, store: &PropertyStore) -> Self {
        self.properties.apply(store);
        self
    }

    pub fn debug(self, enabled: bool) -> Self {
        self.set(CONTEXT_DEBUG, enabled)
    }

    pub fn locale(self, locale: &Locale) -> Self {
        self.set(CONTEXT_LOCALE, locale.as_str())
    }

    pub fn time_zone(self, time_zone: Tz) -> Self {
        self.set(CONTEXT_TIME_ZONE, time_zone.name())
    }

    pub fn media_type(self, media_type: &Mime) -> Self {
        self.set(CONTEXT_MEDIA_TYPE, media_type.as_ref())
    }

    /// Resolve through `cache` instead of the process-wide cache.
    pub fn cache(mut self, cache: Arc<ObjectCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Snapshot of the staged properties.
    pub fn property_store(&self) -> PropertyStore {
        self.properties.build()
    }

    /// Resolve the canonical instance for the staged properties.
    pub fn build(&self) -> Result<Arc<T>, ContextError> {
        let store = self.properties.build();
        self.target().resolve::<T>(&store)
    }

    /// Like [`build`](Self::build), constructing with `factory` on a miss.
    pub fn build_with<F>(&self, factory: F) -> Result<Arc<T>, ContextError>
    where
        F: FnOnce(&PropertyStore) -> Result<T, CreateError>,
    {
        let store = self.properties.build();
        self.target().resolve_with(&store, factory)
    }

    fn target(&self) -> Arc<ObjectCache> {
        match &self.cache {
            Some(cache) => Arc::clone(cache),
            None => global_cache(),
        }
    }
}

impl<T: Context> Default for ContextBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ContextBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            cache: self.cache.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Context> fmt::Debug for ContextBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("type", &T::TYPE_NAME)
            .field("properties", &self.properties)
            .field("dedicated_cache", &self.cache.is_some())
            .finish()
    }
}
