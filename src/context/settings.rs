//! Root-namespace settings shared by every context type.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use mime_guess::Mime;
use serde::Serialize;

use crate::error::ConfigurationError;
use crate::store::PropertyStore;

pub const CONTEXT_DEBUG: &str = "Context.debug";
pub const CONTEXT_LOCALE: &str = "Context.locale";
pub const CONTEXT_TIME_ZONE: &str = "Context.timeZone";
pub const CONTEXT_MEDIA_TYPE: &str = "Context.mediaType";

const DEFAULT_LOCALE: &str = "en-US";

/// Language tag such as `en-US` or `zh-Hant-TW`.
///
/// Underscores are accepted as separators; the language subtag is stored in
/// lowercase and two-letter region subtags in uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn parse(tag: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| {
            ConfigurationError::invalid_value(CONTEXT_LOCALE, format!("`{tag}` {reason}"))
        };

        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(invalid("is empty"));
        }

        let mut normalized = Vec::new();
        for (index, subtag) in trimmed.split(['-', '_']).enumerate() {
            if subtag.is_empty() || subtag.len() > 8 {
                return Err(invalid("has a subtag of invalid length"));
            }
            if !subtag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid("contains non-alphanumeric characters"));
            }
            let subtag = match index {
                0 if subtag.chars().all(|c| c.is_ascii_alphabetic()) => subtag.to_ascii_lowercase(),
                0 => return Err(invalid("does not start with a language subtag")),
                _ if subtag.len() == 2 && subtag.chars().all(|c| c.is_ascii_alphabetic()) => {
                    subtag.to_ascii_uppercase()
                }
                _ => subtag.to_string(),
            };
            normalized.push(subtag);
        }

        Ok(Self(normalized.join("-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag.
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self(DEFAULT_LOCALE.to_string())
    }
}

impl FromStr for Locale {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings in the `Context` namespace, parsed once per context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    pub debug: bool,
    pub locale: Locale,
    pub time_zone: Tz,
    pub media_type: Option<Mime>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            debug: false,
            locale: Locale::default(),
            time_zone: Tz::UTC,
            media_type: None,
        }
    }
}

impl ContextSettings {
    pub fn from_store(store: &PropertyStore) -> Result<Self, ConfigurationError> {
        let mut settings = Self::default();

        if let Some(debug) = store.get_as::<bool>(CONTEXT_DEBUG)? {
            settings.debug = debug;
        }
        if let Some(tag) = store.get_as::<String>(CONTEXT_LOCALE)? {
            settings.locale = Locale::parse(&tag)?;
        }
        if let Some(name) = store.get_as::<String>(CONTEXT_TIME_ZONE)? {
            settings.time_zone = parse_time_zone(&name)?;
        }
        if let Some(media_type) = store.get_as::<String>(CONTEXT_MEDIA_TYPE)? {
            settings.media_type = Some(parse_media_type(&media_type)?);
        }

        Ok(settings)
    }
}

pub(crate) fn parse_time_zone(name: &str) -> Result<Tz, ConfigurationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| ConfigurationError::invalid_value(CONTEXT_TIME_ZONE, err.to_string()))
}

pub(crate) fn parse_media_type(value: &str) -> Result<Mime, ConfigurationError> {
    value.trim().parse::<Mime>().map_err(|err| {
        ConfigurationError::invalid_value(CONTEXT_MEDIA_TYPE, format!("`{value}`: {err}"))
    })
}
