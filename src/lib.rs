//! Fingerprint-keyed reuse of immutable contexts.
//!
//! Contexts are expensive, immutable objects derived from a
//! [`PropertyStore`]. Building one through a [`ContextBuilder`] consults an
//! [`ObjectCache`] keyed by a fingerprint of only the properties the context
//! type reads, so builders that differ in irrelevant properties share one
//! instance. Per-call state lives in short-lived [`Session`]s.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod session;
pub mod store;
pub mod telemetry;

pub use cache::{CacheConfig, Fingerprint, ObjectCache, global_cache};
pub use context::{Context, ContextBuilder, ContextMap, ContextSettings, Locale};
pub use error::{ConfigurationError, ContextError, CreateError, PropertyError, SessionError};
pub use session::{Session, SessionArgs, SessionListener, SessionOutcome};
pub use store::{PropertyStore, PropertyStoreBuilder, PropertyValue};
