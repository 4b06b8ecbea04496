//! Context cache.
//!
//! Deduplicates context instances by the part of their property store they
//! actually read:
//!
//! - **Namespace registry**: which namespaces each context type reads
//! - **Object cache**: one canonical instance per `(type, fingerprint)`
//! - **Stats**: per-type create/hit counts, reported on demand
//!
//! ## Configuration
//!
//! The process-wide cache reads `[cache]` from `ctxcache.toml`:
//!
//! ```toml
//! [cache]
//! deep_match = false
//! collect_stats = true
//! emit_metrics = false
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod registry;
mod stats;
mod store;

pub use config::CacheConfig;
pub use keys::{Fingerprint, Namespaces, ROOT_NAMESPACE};
pub use registry::{ContextType, NamespaceRegistry};
pub use stats::{
    CacheStats, FanoutRecorder, LookupCounts, LookupRecorder, MetricsRecorder, NoopRecorder,
    StatsReporter, TableReporter, TracingReporter, TypeStats,
};
pub use store::{
    Fingerprinter, GlobalCacheError, ObjectCache, ObjectCacheBuilder, StoreFingerprinter,
    configure_global_cache, global_cache,
};
