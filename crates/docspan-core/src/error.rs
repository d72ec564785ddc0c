//! Error taxonomy shared by the chunker, the upsert protocol, search, and
//! every [`Store`](crate::store::Store) implementation.

use thiserror::Error;

/// Result type alias for docspan core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for docspan core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller-supplied input was rejected before any store access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A commit precondition no longer held. Stores return this so the
    /// upsert protocol can re-read and retry; callers of
    /// [`ContextStore`](crate::context_store::ContextStore) never see it.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Bounded retries were exhausted; the caller may try again later.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Machine-readable code used by transports.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "bad_request",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Unavailable(_) => "unavailable",
            CoreError::Storage(_) | CoreError::Serialization(_) => "internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(CoreError::InvalidInput("x".into()).code(), "bad_request");
        assert_eq!(CoreError::NotFound("x".into()).code(), "not_found");
        assert_eq!(CoreError::Unavailable("x".into()).code(), "unavailable");
        assert_eq!(CoreError::Storage("x".into()).code(), "internal");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = CoreError::InvalidInput("max_heading_depth must be >= 1".into());
        assert_eq!(
            err.to_string(),
            "invalid input: max_heading_depth must be >= 1"
        );
    }

    #[test]
    fn test_only_conflict_is_conflict() {
        assert!(CoreError::Conflict("c".into()).is_conflict());
        assert!(!CoreError::Storage("s".into()).is_conflict());
    }
}
