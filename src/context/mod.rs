//! Context types.
//!
//! A context is an immutable, thread-safe object built from a
//! [`PropertyStore`]. Contexts are never constructed directly by callers:
//! they are obtained through a [`ContextBuilder`], which resolves them
//! through an [`ObjectCache`](crate::cache::ObjectCache) so equivalent
//! configurations share one instance.

mod builder;
mod settings;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use mime_guess::Mime;
use serde::Serialize;
use serde_json::Value as JsonValue;

pub use builder::ContextBuilder;
pub use settings::{
    CONTEXT_DEBUG, CONTEXT_LOCALE, CONTEXT_MEDIA_TYPE, CONTEXT_TIME_ZONE, ContextSettings, Locale,
};

use crate::cache::{ContextType, ObjectCache};
use crate::error::CreateError;
use crate::session::{Session, SessionArgs};
use crate::store::PropertyStore;

/// An immutable configured object, cached by the relevant part of its store.
pub trait Context: Send + Sync + Sized + 'static {
    /// Namespace of the properties this type itself defines.
    const TYPE_NAME: &'static str;

    /// Namespaces of the types this one specializes, nearest first.
    fn lineage() -> &'static [&'static str] {
        &[]
    }

    /// Build an instance from `store`.
    ///
    /// Must depend on nothing but `store`: concurrent callers may each build
    /// an instance and all but one are discarded.
    fn create(store: &PropertyStore) -> Result<Self, CreateError>;

    /// The store this instance was built from.
    fn property_store(&self) -> &PropertyStore;

    fn settings(&self) -> &ContextSettings;

    /// Media type used by sessions when neither the arguments nor
    /// `Context.mediaType` name one.
    fn default_media_type(&self) -> Mime {
        mime_guess::mime::APPLICATION_OCTET_STREAM
    }

    /// Arguments [`create_session`](Context::create_session) starts from.
    fn default_session_args(&self) -> SessionArgs {
        SessionArgs::new()
    }

    /// Builder seeded with this instance's store.
    ///
    /// Instances do not remember which cache published them, so the builder
    /// resolves through [`global_cache`](crate::cache::global_cache). Use
    /// [`builder_in`](Context::builder_in) for instances from a dedicated
    /// cache.
    fn builder(&self) -> ContextBuilder<Self> {
        ContextBuilder::from_store(self.property_store())
    }

    /// Builder seeded with this instance's store, resolving through `cache`.
    fn builder_in(&self, cache: &Arc<ObjectCache>) -> ContextBuilder<Self> {
        self.builder().cache(Arc::clone(cache))
    }

    fn as_map(&self) -> ContextMap {
        ContextMap::of(self)
    }

    fn create_session(&self) -> Session<'_, Self> {
        Session::new(self, self.default_session_args())
    }

    fn create_session_with(&self, args: SessionArgs) -> Session<'_, Self> {
        Session::new(self, args)
    }
}

/// Diagnostic view of a context: its relevant properties grouped by
/// namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMap {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub fingerprint: String,
    pub properties: BTreeMap<&'static str, BTreeMap<String, JsonValue>>,
}

impl ContextMap {
    pub fn of<T: Context>(context: &T) -> Self {
        let namespaces = ContextType::of::<T>().relevant_namespaces();
        let store = context.property_store();

        let mut properties: BTreeMap<&'static str, BTreeMap<String, JsonValue>> = BTreeMap::new();
        for namespace in namespaces.iter() {
            let group: BTreeMap<_, _> = store
                .group(namespace)
                .map(|(name, value)| (local_name(name).to_string(), value.to_json()))
                .collect();
            if !group.is_empty() {
                properties.insert(namespace, group);
            }
        }

        Self {
            type_name: T::TYPE_NAME,
            fingerprint: store.fingerprint(&namespaces).to_string(),
            properties,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

impl fmt::Display for ContextMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

fn local_name(name: &str) -> &str {
    name.split_once('.').map_or(name, |(_, key)| key)
}
