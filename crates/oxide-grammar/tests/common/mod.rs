#![allow(dead_code)]

use oxide_grammar::{Binding, Dialect, Grammar, GrammarConfig, Param, Registry, Row};

pub fn grammar(dialect: Dialect) -> Box<dyn Grammar> {
    dialect.grammar(GrammarConfig::new())
}

pub fn select(dialect: Dialect, query: &Registry) -> String {
    let grammar = grammar(dialect);
    query
        .to_sql(grammar.as_ref())
        .unwrap_or_else(|e| panic!("Failed to compile for {dialect}: {e}"))
        .0
}

pub fn row(pairs: &[(&str, Param)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (String::from(*column), value.clone()))
        .collect()
}

pub fn text(value: &str) -> Binding {
    Binding::Text(String::from(value))
}

/// Counts the `?` placeholders of compiled SQL: `??` and anything inside a
/// string literal are not placeholders.
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if chars.peek() == Some(&'?') => {
                chars.next();
            }
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}

/// Asserts that a compiled statement has one binding per placeholder.
pub fn assert_parity(sql: &str, bindings: &[Binding]) {
    assert_eq!(
        placeholder_count(sql),
        bindings.len(),
        "placeholder/binding mismatch.\n  SQL:      {sql}\n  Bindings: {bindings:?}"
    );
}
