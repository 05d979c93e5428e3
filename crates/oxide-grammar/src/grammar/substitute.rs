//! Inlining of escaped bindings into parameterized SQL.
//!
//! The output is meant for logs and EXPLAIN, never for execution.

use std::collections::VecDeque;

/// Replaces each `?` outside string literals with the next escaped value.
///
/// `\'`, `''` and `??` are copied through untouched. Placeholders left
/// over once the values run out stay `?`.
pub(super) fn positional(sql: &str, escaped: Vec<String>) -> String {
    let mut values: VecDeque<String> = escaped.into();
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('\\', Some('\'')) | ('\'', Some('\'')) | ('?', Some('?')) => {
                out.push(c);
                if let Some(n) = chars.next() {
                    out.push(n);
                }
            }
            ('\'', _) => {
                out.push(c);
                in_literal = !in_literal;
            }
            ('?', _) if !in_literal => match values.pop_front() {
                Some(value) => out.push_str(&value),
                None => out.push('?'),
            },
            _ => out.push(c),
        }
    }

    out
}

/// Replaces `:key` markers with escaped values, preferring the longest key.
///
/// `::` (a Postgres cast) is never treated as a marker.
pub(super) fn named(sql: &str, mut escaped: Vec<(String, String)>) -> String {
    escaped.retain(|(key, _)| !key.is_empty());
    escaped.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix(':') {
            out.push_str("::");
            rest = tail;
            continue;
        }

        match escaped.iter().find(|(key, _)| after.starts_with(key.as_str())) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len()..];
            }
            None => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}
