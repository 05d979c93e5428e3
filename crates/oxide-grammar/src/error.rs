//! Error types for query compilation.

use thiserror::Error;

/// Errors raised while compiling a registry into SQL.
///
/// Every variant is a programming or capability error: retrying the same
/// compilation against the same grammar always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The active dialect has no SQL form for the requested feature.
    #[error("This database engine does not support {0}.")]
    UnsupportedOperation(String),

    /// A clause was constructed with an impossible shape.
    #[error("invalid clause: {0}")]
    InvalidClause(String),
}

impl GrammarError {
    /// Creates an [`GrammarError::UnsupportedOperation`] for a feature description.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::UnsupportedOperation(feature.into())
    }

    /// Creates an [`GrammarError::InvalidClause`] with a message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidClause(message.into())
    }
}

/// Result type alias for grammar operations.
pub type Result<T> = std::result::Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_reads_like_a_sentence() {
        let err = GrammarError::unsupported("upserts");
        assert_eq!(
            err.to_string(),
            "This database engine does not support upserts."
        );
    }

    #[test]
    fn test_invalid_clause_message() {
        let err = GrammarError::invalid("row values need as many values as columns");
        assert_eq!(
            err.to_string(),
            "invalid clause: row values need as many values as columns"
        );
    }
}
