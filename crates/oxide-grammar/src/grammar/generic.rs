//! Generic (ANSI) grammar.

use super::Grammar;
use crate::config::GrammarConfig;

/// A grammar using the trait's ANSI defaults.
#[derive(Debug, Clone, Default)]
pub struct GenericGrammar {
    config: GrammarConfig,
}

impl GenericGrammar {
    /// Creates a generic grammar.
    #[must_use]
    pub const fn new(config: GrammarConfig) -> Self {
        Self { config }
    }
}

impl Grammar for GenericGrammar {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn config(&self) -> &GrammarConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_generic_grammar() {
        let grammar = GenericGrammar::default();
        assert_eq!(grammar.name(), "generic");
        assert_eq!(grammar.wrap_value("users"), "\"users\"");
        assert!(grammar.supports_savepoints());
        assert_eq!(grammar.compile_savepoint("one"), "SAVEPOINT one");
        assert_eq!(
            grammar.compile_savepoint_rollback("one"),
            "ROLLBACK TO SAVEPOINT one"
        );
    }

    #[test]
    fn test_generic_unsupported_features() {
        let grammar = GenericGrammar::default();
        let query = Registry::table("users").use_index("idx");
        assert_eq!(
            grammar.compile_select(&query).unwrap_err().to_string(),
            "This database engine does not support index hints."
        );
        assert!(grammar.compile_upsert(&query, &[], &[], &[]).is_err());
        assert!(grammar.compile_insert_or_ignore(&query, &[]).is_err());
    }

    #[test]
    fn test_generic_truncate_and_exists() {
        let grammar = GenericGrammar::default();
        let query = Registry::table("users");
        let truncate = grammar.compile_truncate(&query).unwrap();
        assert_eq!(truncate.len(), 1);
        assert!(truncate.contains_key("truncate table \"users\""));
        assert_eq!(
            grammar.compile_exists(&query).unwrap(),
            "select exists(select * from \"users\") as \"exists\""
        );
    }
}
