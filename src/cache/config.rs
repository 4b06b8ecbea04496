//! Cache configuration.
//!
//! Supplied explicitly when an [`ObjectCache`](super::ObjectCache) is built;
//! the cache never consults the environment on its own.

use serde::Deserialize;

/// Object cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Compare the full store on every hit and fail on fingerprint collisions.
    pub deep_match: bool,
    /// Keep per-type create/hit counters in memory.
    pub collect_stats: bool,
    /// Forward create/hit counts to the `metrics` facade.
    pub emit_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            deep_match: false,
            collect_stats: true,
            emit_metrics: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            deep_match: settings.deep_match,
            collect_stats: settings.collect_stats,
            emit_metrics: settings.emit_metrics,
        }
    }
}
