#![allow(dead_code)]

use std::sync::Arc;

use ctxcache::cache::ObjectCache;
use ctxcache::context::{Context, ContextBuilder, ContextSettings};
use ctxcache::error::{ConfigurationError, CreateError};
use ctxcache::store::PropertyStore;
use mime_guess::{Mime, mime};

pub const SIMPLE_ATTRS: &str = "JsonSerializer.simpleAttrs";
pub const MAX_INDENT: &str = "WriterSerializer.maxIndent";
pub const TRIM_NULLS: &str = "Serializer.trimNulls";
pub const STRICT: &str = "Parser.strict";

/// Serializer-like context reading three levels of namespaces.
#[derive(Debug)]
pub struct JsonSerializer {
    store: PropertyStore,
    settings: ContextSettings,
    pub simple_attrs: bool,
    pub max_indent: u32,
    pub trim_nulls: bool,
}

impl Context for JsonSerializer {
    const TYPE_NAME: &'static str = "JsonSerializer";

    fn lineage() -> &'static [&'static str] {
        &["WriterSerializer", "Serializer"]
    }

    fn create(store: &PropertyStore) -> Result<Self, CreateError> {
        let max_indent = store.get_or(MAX_INDENT, 100)?;
        if max_indent > 1_000 {
            return Err(ConfigurationError::invalid_value(MAX_INDENT, "must not exceed 1000").into());
        }

        Ok(Self {
            store: store.clone(),
            settings: ContextSettings::from_store(store)?,
            simple_attrs: store.get_or(SIMPLE_ATTRS, false)?,
            max_indent,
            trim_nulls: store.get_or(TRIM_NULLS, false)?,
        })
    }

    fn property_store(&self) -> &PropertyStore {
        &self.store
    }

    fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    fn default_media_type(&self) -> Mime {
        mime::APPLICATION_JSON
    }
}

/// Parser-like context unrelated to the serializer lineage.
#[derive(Debug)]
pub struct Parser {
    store: PropertyStore,
    settings: ContextSettings,
    pub strict: bool,
}

impl Context for Parser {
    const TYPE_NAME: &'static str = "Parser";

    fn create(store: &PropertyStore) -> Result<Self, CreateError> {
        Ok(Self {
            store: store.clone(),
            settings: ContextSettings::from_store(store)?,
            strict: store.get_or(STRICT, false)?,
        })
    }

    fn property_store(&self) -> &PropertyStore {
        &self.store
    }

    fn settings(&self) -> &ContextSettings {
        &self.settings
    }
}

pub fn isolated_cache() -> Arc<ObjectCache> {
    Arc::new(ObjectCache::default())
}

pub fn serializer(cache: &Arc<ObjectCache>) -> ContextBuilder<JsonSerializer> {
    ContextBuilder::new().cache(Arc::clone(cache))
}

pub fn parser(cache: &Arc<ObjectCache>) -> ContextBuilder<Parser> {
    ContextBuilder::new().cache(Arc::clone(cache))
}
