use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono_tz::Tz;
use mime_guess::Mime;

use super::listener::SessionListener;
use crate::context::Locale;
use crate::store::PropertyValue;

/// Call-scoped arguments for one session.
///
/// Anything left unset falls back to the context's settings.
#[derive(Clone, Default)]
pub struct SessionArgs {
    pub(super) properties: BTreeMap<String, PropertyValue>,
    pub(super) locale: Option<Locale>,
    pub(super) time_zone: Option<Tz>,
    pub(super) media_type: Option<Mime>,
    pub(super) debug: Option<bool>,
    pub(super) listener: Option<Arc<dyn SessionListener>>,
}

impl SessionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a property for this session only.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = Some(time_zone);
        self
    }

    pub fn media_type(mut self, media_type: Mime) -> Self {
        self.media_type = Some(media_type);
        self
    }

    /// Guess the media type from a file name; unknown extensions leave it unset.
    pub fn media_type_for_path(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(guessed) = mime_guess::from_path(path).first() {
            self.media_type = Some(guessed);
        }
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl fmt::Debug for SessionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionArgs")
            .field("properties", &self.properties)
            .field("locale", &self.locale)
            .field("time_zone", &self.time_zone)
            .field("media_type", &self.media_type)
            .field("debug", &self.debug)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
