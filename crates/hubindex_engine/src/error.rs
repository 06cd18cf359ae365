//! Error types for search engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while talking to the search engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The index, alias or document does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// The missing index, alias or document.
        resource: String,
    },

    /// An index with this name already exists.
    #[error("index already exists: {index}")]
    AlreadyExists {
        /// Name of the existing index.
        index: String,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// The engine failed to process the request (5xx).
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The engine rejected the request (4xx other than not-found).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// A request or response body could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a rejected request error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// Returns true if the caller may retry the call.
    ///
    /// hubindex itself never retries; this is for callers layered on top.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Server { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EngineError::transport_retryable("connection reset").is_retryable());
        assert!(!EngineError::transport_fatal("bad certificate").is_retryable());
        assert!(EngineError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!EngineError::not_found("idx").is_retryable());
        assert!(!EngineError::rejected(400, "bad mapping").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::AlreadyExists {
            index: "shop__web__asset-odd".into(),
        };
        assert_eq!(
            err.to_string(),
            "index already exists: shop__web__asset-odd"
        );
        assert!(EngineError::not_found("x").is_not_found());
    }
}
