//! Raw SQL fragments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw SQL fragment that bypasses quoting and parameterization.
///
/// **Warning**: the text is emitted exactly as given. Only build expressions
/// from trusted input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    /// Creates a new raw expression.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// Returns the raw SQL text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Consumes the expression and returns the raw SQL text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`Expression::new`].
#[must_use]
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_keeps_text() {
        let expr = raw("count(*) as total");
        assert_eq!(expr.value(), "count(*) as total");
        assert_eq!(expr.to_string(), "count(*) as total");
    }

    #[test]
    fn test_serde_is_transparent() {
        let expr: Expression = serde_json::from_str("\"now()\"").unwrap();
        assert_eq!(expr, raw("now()"));
        assert_eq!(serde_json::to_string(&expr).unwrap(), "\"now()\"");
    }
}
