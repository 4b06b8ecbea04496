//! Object cache.
//!
//! Maps `(context type, fingerprint)` to one canonical context instance.
//! Lookups of published entries only take a shard read lock. Misses build a
//! candidate outside any lock and race to publish it; the loser's candidate is
//! dropped and the loser returns the winner's instance.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::config::CacheConfig;
use super::keys::{Fingerprint, Namespaces};
use super::registry::{ContextType, NamespaceRegistry};
use super::stats::{CacheStats, FanoutRecorder, LookupRecorder, MetricsRecorder, NoopRecorder};
use crate::context::Context;
use crate::error::{ContextError, CreateError};
use crate::store::PropertyStore;

type SharedContext = Arc<dyn Any + Send + Sync>;

/// Computes the fingerprint the cache keys entries by.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, store: &PropertyStore, namespaces: &Namespaces) -> Fingerprint;
}

/// Delegates to [`PropertyStore::fingerprint`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreFingerprinter;

impl Fingerprinter for StoreFingerprinter {
    fn fingerprint(&self, store: &PropertyStore, namespaces: &Namespaces) -> Fingerprint {
        store.fingerprint(namespaces)
    }
}

/// A published context together with the exact store it was built from.
#[derive(Clone)]
struct CacheEntry {
    store: PropertyStore,
    context: SharedContext,
}

struct TypeTable {
    name: &'static str,
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl TypeTable {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
        }
    }

    fn get(&self, fingerprint: Fingerprint) -> Option<CacheEntry> {
        self.entries
            .get(&fingerprint)
            .map(|entry| entry.value().clone())
    }
}

/// Process-lifetime registry of canonical context instances.
///
/// Entries are only ever added; nothing is evicted until [`ObjectCache::clear`].
pub struct ObjectCache {
    deep_match: bool,
    tables: DashMap<TypeId, Arc<TypeTable>>,
    namespaces: NamespaceRegistry,
    fingerprinter: Arc<dyn Fingerprinter>,
    recorder: Arc<dyn LookupRecorder>,
    stats: Option<Arc<CacheStats>>,
}

impl ObjectCache {
    /// Create a cache from explicit configuration.
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = Self::builder()
            .deep_match(config.deep_match)
            .collect_stats(config.collect_stats);
        if config.emit_metrics {
            builder = builder.recorder(Arc::new(MetricsRecorder));
        }
        builder.build()
    }

    pub fn builder() -> ObjectCacheBuilder {
        ObjectCacheBuilder::default()
    }

    /// Resolve the canonical `T` for `store`, building it with `T::create`.
    pub fn resolve<T: Context>(&self, store: &PropertyStore) -> Result<Arc<T>, ContextError> {
        self.resolve_with(store, T::create)
    }

    /// Resolve the canonical `T` for `store`, building it with `factory` on a miss.
    ///
    /// `factory` may run on several threads at once for the same key and its
    /// result may be discarded, so it must not have side effects that are
    /// unsafe to repeat.
    pub fn resolve_with<T, F>(&self, store: &PropertyStore, factory: F) -> Result<Arc<T>, ContextError>
    where
        T: Context,
        F: FnOnce(&PropertyStore) -> Result<T, CreateError>,
    {
        let context_type = ContextType::of::<T>();
        let namespaces = self.namespaces.namespaces_for(&context_type);
        let fingerprint = self.fingerprinter.fingerprint(store, &namespaces);
        let table = self.table_for(&context_type);

        if let Some(entry) = table.get(fingerprint) {
            self.verify(&context_type, fingerprint, &entry, store, &namespaces)?;
            self.recorder.record_lookup(context_type.name, true);
            debug!(
                context_type = context_type.name,
                %fingerprint,
                outcome = "hit",
                "Context cache lookup"
            );
            return downcast(entry, &context_type, fingerprint);
        }

        let built = factory(store).map_err(|err| classify(err, &context_type, store))?;
        let candidate = CacheEntry {
            store: store.clone(),
            context: Arc::new(built),
        };

        match table.entries.entry(fingerprint) {
            Entry::Occupied(occupied) => {
                let winner = occupied.get().clone();
                drop(occupied);
                self.verify(&context_type, fingerprint, &winner, store, &namespaces)?;
                self.recorder.record_lookup(context_type.name, true);
                debug!(
                    context_type = context_type.name,
                    %fingerprint,
                    outcome = "race_discarded",
                    "Context cache lookup"
                );
                downcast(winner, &context_type, fingerprint)
            }
            Entry::Vacant(vacant) => {
                let published = vacant.insert(candidate).value().clone();
                self.recorder.record_lookup(context_type.name, false);
                debug!(
                    context_type = context_type.name,
                    %fingerprint,
                    outcome = "create",
                    "Context cache lookup"
                );
                downcast(published, &context_type, fingerprint)
            }
        }
    }

    /// Namespaces the cache fingerprints for `T`.
    pub fn namespaces_for<T: Context>(&self) -> Namespaces {
        self.namespaces.namespaces_for(&ContextType::of::<T>())
    }

    /// Number of published instances of `T`.
    pub fn entries_for<T: Context>(&self) -> usize {
        self.tables
            .get(&TypeId::of::<T>())
            .map(|table| table.entries.len())
            .unwrap_or(0)
    }

    /// Total number of published instances.
    pub fn len(&self) -> usize {
        self.tables
            .iter()
            .map(|table| table.value().entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of context types with a table.
    pub fn type_count(&self) -> usize {
        self.tables.len()
    }

    /// Names of the context types with a table, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.iter().map(|table| table.value().name).collect();
        names.sort_unstable();
        names
    }

    pub fn is_deep_match(&self) -> bool {
        self.deep_match
    }

    /// In-memory counters, when stats collection is enabled.
    pub fn stats(&self) -> Option<Arc<CacheStats>> {
        self.stats.clone()
    }

    /// Drop every entry, namespace set and counter.
    ///
    /// Meant for isolating tests. Must not run concurrently with `resolve`: a
    /// resolution already in flight may publish into a table this call has
    /// detached, and the instance it returns is then not canonical.
    pub fn clear(&self) {
        self.tables.clear();
        self.namespaces.clear();
        if let Some(stats) = &self.stats {
            stats.reset();
        }
    }

    fn table_for(&self, context_type: &ContextType) -> Arc<TypeTable> {
        if let Some(table) = self.tables.get(&context_type.id) {
            return Arc::clone(table.value());
        }

        let table = self
            .tables
            .entry(context_type.id)
            .or_insert_with(|| Arc::new(TypeTable::new(context_type.name)));
        Arc::clone(table.value())
    }

    fn verify(
        &self,
        context_type: &ContextType,
        fingerprint: Fingerprint,
        entry: &CacheEntry,
        store: &PropertyStore,
        namespaces: &Namespaces,
    ) -> Result<(), ContextError> {
        if !self.deep_match || entry.store.relevant_eq(store, namespaces) {
            return Ok(());
        }

        error!(
            context_type = context_type.name,
            %fingerprint,
            outcome = "collision",
            "Fingerprint collision between non-equal stores"
        );
        Err(ContextError::CacheIntegrity {
            type_name: context_type.name,
            fingerprint,
            cached: entry.store.summary(),
            requested: store.summary(),
        })
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("deep_match", &self.deep_match)
            .field("types", &self.type_count())
            .field("entries", &self.len())
            .field("collect_stats", &self.stats.is_some())
            .finish()
    }
}

fn downcast<T: Context>(
    entry: CacheEntry,
    context_type: &ContextType,
    fingerprint: Fingerprint,
) -> Result<Arc<T>, ContextError> {
    let CacheEntry { store, context } = entry;
    context
        .downcast::<T>()
        .map_err(|_| ContextError::CacheIntegrity {
            type_name: context_type.name,
            fingerprint,
            cached: format!("instance of another type built from {}", store.summary()),
            requested: context_type.name.to_string(),
        })
}

fn classify(err: CreateError, context_type: &ContextType, store: &PropertyStore) -> ContextError {
    let classified = match err {
        CreateError::Configuration(source) => ContextError::Configuration {
            type_name: context_type.name,
            source,
        },
        CreateError::Other(source) => ContextError::Construction {
            type_name: context_type.name,
            store_summary: store.summary(),
            source,
        },
    };
    warn!(
        context_type = context_type.name,
        error = %classified,
        "Context construction failed"
    );
    classified
}

/// Assembles an [`ObjectCache`].
pub struct ObjectCacheBuilder {
    deep_match: bool,
    stats: Option<Arc<CacheStats>>,
    recorders: Vec<Arc<dyn LookupRecorder>>,
    fingerprinter: Arc<dyn Fingerprinter>,
}

impl Default for ObjectCacheBuilder {
    fn default() -> Self {
        Self {
            deep_match: false,
            stats: None,
            recorders: Vec::new(),
            fingerprinter: Arc::new(StoreFingerprinter),
        }
    }
}

impl ObjectCacheBuilder {
    pub fn deep_match(mut self, enabled: bool) -> Self {
        self.deep_match = enabled;
        self
    }

    /// Keep fresh in-memory counters; `false` drops any configured ones.
    pub fn collect_stats(mut self, enabled: bool) -> Self {
        self.stats = enabled.then(|| Arc::new(CacheStats::new()));
        self
    }

    /// Count into an existing [`CacheStats`].
    pub fn stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Add a recorder invoked on every resolution.
    pub fn recorder(mut self, recorder: Arc<dyn LookupRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    pub fn fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn build(self) -> ObjectCache {
        let Self {
            deep_match,
            stats,
            recorders,
            fingerprinter,
        } = self;

        let mut all: Vec<Arc<dyn LookupRecorder>> = Vec::with_capacity(recorders.len() + 1);
        if let Some(stats) = &stats {
            all.push(stats.clone());
        }
        all.extend(recorders);

        let recorder: Arc<dyn LookupRecorder> = match all.len() {
            0 => Arc::new(NoopRecorder),
            1 => all.remove(0),
            _ => Arc::new(
                all.into_iter()
                    .fold(FanoutRecorder::new(), |fanout, recorder| fanout.with(recorder)),
            ),
        };

        ObjectCache {
            deep_match,
            tables: DashMap::new(),
            namespaces: NamespaceRegistry::new(),
            fingerprinter,
            recorder,
            stats,
        }
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static GLOBAL_CACHE_CONFIG: OnceCell<CacheConfig> = OnceCell::new();

static GLOBAL_CACHE: Lazy<Arc<ObjectCache>> =
    Lazy::new(|| Arc::new(ObjectCache::new(active_global_config())));

#[derive(Debug, Error)]
pub enum GlobalCacheError {
    #[error("global context cache already configured")]
    AlreadyConfigured,
}

/// Set the configuration of the process-wide cache.
///
/// Only the first call succeeds, and it only takes effect if made before the
/// first call to [`global_cache`].
pub fn configure_global_cache(config: CacheConfig) -> Result<(), GlobalCacheError> {
    GLOBAL_CACHE_CONFIG
        .set(config)
        .map_err(|_| GlobalCacheError::AlreadyConfigured)
}

fn active_global_config() -> CacheConfig {
    GLOBAL_CACHE_CONFIG.get().copied().unwrap_or_default()
}

/// Access the process-wide cache, initialised on first use.
pub fn global_cache() -> Arc<ObjectCache> {
    Arc::clone(&GLOBAL_CACHE)
}
