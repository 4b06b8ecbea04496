use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::cache::Fingerprint;

/// Boxed error used for failures the cache does not classify itself.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Raised while reading or mutating a property whose stored value does not
/// have the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property `{name}` expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("property `{name}` holds {found} and cannot take `{operation}`")]
    Conflict {
        name: String,
        operation: &'static str,
        found: &'static str,
    },
}

impl PropertyError {
    pub fn type_mismatch(name: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    pub fn conflict(name: impl Into<String>, operation: &'static str, found: &'static str) -> Self {
        Self::Conflict {
            name: name.into(),
            operation,
            found,
        }
    }
}

/// A store encodes a value a context type cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("property `{name}` has an invalid value: {message}")]
    InvalidValue { name: String, message: String },
    #[error("properties `{first}` and `{second}` are inconsistent: {message}")]
    Inconsistent {
        first: String,
        second: String,
        message: String,
    },
}

impl ConfigurationError {
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn inconsistent(
        first: impl Into<String>,
        second: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Inconsistent {
            first: first.into(),
            second: second.into(),
            message: message.into(),
        }
    }
}

/// Failure returned by a context factory.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Other(BoxError),
}

impl CreateError {
    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }
}

impl From<PropertyError> for CreateError {
    fn from(error: PropertyError) -> Self {
        Self::Configuration(error.into())
    }
}

/// Errors surfaced by cache resolution and context builders.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid configuration for context `{type_name}`: {source}")]
    Configuration {
        type_name: &'static str,
        #[source]
        source: ConfigurationError,
    },
    #[error(
        "fingerprint collision for context `{type_name}` at {fingerprint}: cached {cached}, requested {requested}"
    )]
    CacheIntegrity {
        type_name: &'static str,
        fingerprint: Fingerprint,
        cached: String,
        requested: String,
    },
    #[error("failed to construct context `{type_name}` from {store_summary}: {source}")]
    Construction {
        type_name: &'static str,
        store_summary: String,
        #[source]
        source: BoxError,
    },
}

impl ContextError {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Configuration { type_name, .. }
            | Self::CacheIntegrity { type_name, .. }
            | Self::Construction { type_name, .. } => type_name,
        }
    }

    /// Returns true for collisions detected in deep-match mode.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::CacheIntegrity { .. })
    }
}

/// Errors raised while a session performs its operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("session operation failed: {0}")]
    Operation(BoxError),
    #[error("session aborted: {reason}")]
    Aborted { reason: String },
}

impl SessionError {
    pub fn operation(error: impl Into<BoxError>) -> Self {
        Self::Operation(error.into())
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }
}
