//! Error types for hubindex core.

use crate::element::{ElementId, ElementType};
use hubindex_engine::EngineError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in hubindex core operations.
///
/// Migration step failures (`IndexCreateFailed`, `RefreshFailed`,
/// `ReindexFailed`, `AliasSwapFailed`) abort the running migration; the
/// steps already completed stay applied and nothing after the failing step
/// is attempted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A type tag, name or value handed to the resolver is unusable.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// No physical index answers to the alias.
    #[error("no index is bound to alias {alias}")]
    AliasNotFound {
        /// The alias (logical index name).
        alias: String,
    },

    /// The index has no mapping, or was never created.
    #[error("no mapping found for {index}")]
    NoMappingFound {
        /// The index or alias looked up.
        index: String,
    },

    /// The engine did not acknowledge index creation.
    #[error("could not create index {index}: {reason}")]
    IndexCreateFailed {
        /// The index that was being created.
        index: String,
        /// Engine response or error.
        reason: String,
    },

    /// The engine failed to refresh the source index before reindexing.
    #[error("could not refresh index {index}: {reason}")]
    RefreshFailed {
        /// The index being refreshed.
        index: String,
        /// Engine response or error.
        reason: String,
    },

    /// The server-side copy reported failures.
    #[error("could not reindex data from {from_index} to {to_index}: {reason}")]
    ReindexFailed {
        /// Index documents were copied from.
        from_index: String,
        /// Index documents were copied into.
        to_index: String,
        /// Engine response or error.
        reason: String,
    },

    /// The engine did not acknowledge the alias rebind.
    #[error("could not bind alias {alias} to {index}: {reason}")]
    AliasSwapFailed {
        /// The alias being rebound.
        alias: String,
        /// The index it should point at.
        index: String,
        /// Engine response or error.
        reason: String,
    },

    /// An element could not be found in the element store.
    #[error("{element_type} element {id} not found")]
    ElementNotFound {
        /// Element family.
        element_type: ElementType,
        /// Element id.
        id: ElementId,
    },

    /// The element store failed.
    #[error("element store error: {message}")]
    Store {
        /// Description of the failure.
        message: String,
    },

    /// An element could not be serialized into a document.
    #[error("could not encode element {id}: {message}")]
    Codec {
        /// The element id.
        id: ElementId,
        /// Description of the failure.
        message: String,
    },

    /// Search engine error outside a migration step.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl CoreError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an alias not found error.
    pub fn alias_not_found(alias: impl Into<String>) -> Self {
        Self::AliasNotFound {
            alias: alias.into(),
        }
    }

    /// Creates a no mapping found error.
    pub fn no_mapping_found(index: impl Into<String>) -> Self {
        Self::NoMappingFound {
            index: index.into(),
        }
    }

    /// Creates an element store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(id: ElementId, message: impl Into<String>) -> Self {
        Self::Codec {
            id,
            message: message.into(),
        }
    }

    /// Returns true if the error is a failed migration step.
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            CoreError::IndexCreateFailed { .. }
                | CoreError::RefreshFailed { .. }
                | CoreError::ReindexFailed { .. }
                | CoreError::AliasSwapFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_failures() {
        let err = CoreError::ReindexFailed {
            from_index: "a-even".into(),
            to_index: "a-odd".into(),
            reason: "2 failures".into(),
        };
        assert!(err.is_migration_failure());
        assert_eq!(
            err.to_string(),
            "could not reindex data from a-even to a-odd: 2 failures"
        );
        assert!(!CoreError::alias_not_found("a").is_migration_failure());
    }

    #[test]
    fn engine_errors_convert() {
        let err: CoreError = EngineError::not_found("x").into();
        assert!(matches!(err, CoreError::Engine(_)));
    }
}
