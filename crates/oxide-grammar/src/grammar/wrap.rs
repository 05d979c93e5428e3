//! Identifier quoting, alias splitting and JSON path wrapping.

use super::Grammar;
use crate::error::Result;
use crate::registry::Ident;

/// Quotes one identifier segment, doubling the closing quote character.
pub(crate) fn quote(value: &str, open: char, close: char) -> String {
    if value == "*" {
        return String::from("*");
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push(open);
    for c in value.chars() {
        out.push(c);
        if c == close {
            out.push(c);
        }
    }
    out.push(close);
    out
}

/// Splits `target as alias` (any case, any whitespace run around `as`).
pub(crate) fn split_alias(value: &str) -> Option<(&str, &str)> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i + 2 < bytes.len()
            && bytes[i..i + 2].eq_ignore_ascii_case(b"as")
            && bytes[i + 2].is_ascii_whitespace()
        {
            let mut end = i + 2;
            while end < bytes.len() && bytes[end].is_ascii_whitespace() {
                end += 1;
            }
            return Some((&value[..start], &value[end..]));
        }
    }
    None
}

/// Returns the alias of a compiled `table as alias`, or the table itself.
pub(crate) fn alias_of(table: &str) -> &str {
    table.rsplit(" as ").next().unwrap_or(table)
}

/// Drops the table qualifier of an update key: `users.meta->a` gives `meta->a`.
pub(crate) fn strip_table_qualifier(key: &str) -> &str {
    let column_end = key.find("->").unwrap_or(key.len());
    match key[..column_end].rfind('.') {
        Some(dot) => &key[dot + 1..],
        None => key,
    }
}

/// Returns true for `column->path` selectors.
pub(crate) fn is_json_selector(value: &str) -> bool {
    value.contains("->")
}

/// Strips the conjunction of the first compiled clause.
pub(crate) fn remove_leading_boolean(value: &str) -> &str {
    for keyword in ["and ", "or "] {
        if value.len() >= keyword.len()
            && value.is_char_boundary(keyword.len())
            && value[..keyword.len()].eq_ignore_ascii_case(keyword)
        {
            return &value[keyword.len()..];
        }
    }
    value
}

/// Splits a path segment into its key and its trailing `[..]` groups.
///
/// `tags[0][1]` gives `("tags", "[0][1]")`; `[3]` gives `("", "[3]")`.
pub(crate) fn split_array_keys(segment: &str) -> (&str, &str) {
    let mut end = segment.len();
    loop {
        let head = &segment[..end];
        let Some(body) = head.strip_suffix(']') else {
            break;
        };
        let Some(open) = body.rfind('[') else {
            break;
        };
        let inner = &body[open + 1..];
        if inner.is_empty() || inner.contains(']') {
            break;
        }
        end = open;
    }
    segment.split_at(end)
}

/// Returns the bracket tokens of a suffix: `[0][a]` gives `["0", "a"]`.
pub(crate) fn bracket_tokens(suffix: &str) -> Vec<&str> {
    suffix
        .split(']')
        .filter_map(|part| part.strip_prefix('['))
        .collect()
}

/// Escapes quotes inside a JSON path: a quote and any backslashes before it
/// become a doubled quote.
fn escape_json_path(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut backslashes = String::new();
    for c in value.chars() {
        match c {
            '\\' => backslashes.push(c),
            '\'' => {
                backslashes.clear();
                out.push_str("''");
            }
            _ => {
                out.push_str(&backslashes);
                backslashes.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&backslashes);
    out
}

fn wrap_json_path_segment(segment: &str) -> String {
    let (key, brackets) = split_array_keys(segment);
    if brackets.is_empty() {
        format!("\"{segment}\"")
    } else if key.is_empty() {
        String::from(brackets)
    } else {
        format!("\"{key}\"{brackets}")
    }
}

/// Builds the `'$."a"."b"[0]'` literal for a `->`-delimited path.
pub(crate) fn wrap_json_path(path: &str, delimiter: &str) -> String {
    let escaped = escape_json_path(path);
    let json_path = escaped
        .split(delimiter)
        .map(wrap_json_path_segment)
        .collect::<Vec<_>>()
        .join(".");
    let dot = if json_path.starts_with('[') { "" } else { "." };
    format!("'${dot}{json_path}'")
}

pub(super) fn wrap<G: Grammar + ?Sized>(g: &G, value: &str, prefix_alias: bool) -> Result<String> {
    if let Some((target, alias)) = split_alias(value) {
        let alias = if prefix_alias {
            format!("{}{alias}", g.table_prefix())
        } else {
            String::from(alias)
        };
        return Ok(format!("{} as {}", g.wrap(target)?, g.wrap_value(&alias)));
    }
    if is_json_selector(value) {
        return g.wrap_json_selector(value);
    }
    Ok(wrap_segments(g, value))
}

fn wrap_segments<G: Grammar + ?Sized>(g: &G, value: &str) -> String {
    let segments: Vec<&str> = value.split('.').collect();
    let multi = segments.len() > 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 && multi {
                g.wrap_table(segment)
            } else {
                g.wrap_value(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

pub(super) fn wrap_table<G: Grammar + ?Sized>(g: &G, table: &str) -> String {
    let prefix = g.table_prefix();
    if let Some((name, alias)) = split_alias(table) {
        return format!(
            "{} as {}",
            g.wrap_table(name),
            g.wrap_value(&format!("{prefix}{alias}"))
        );
    }
    if let Some(dot) = table.rfind('.') {
        let (schema, name) = (&table[..dot], &table[dot + 1..]);
        return schema
            .split('.')
            .map(|segment| g.wrap_value(segment))
            .chain(std::iter::once(g.wrap_value(&format!("{prefix}{name}"))))
            .collect::<Vec<_>>()
            .join(".");
    }
    g.wrap_value(&format!("{prefix}{table}"))
}

pub(super) fn wrap_column<G: Grammar + ?Sized>(g: &G, column: &Ident) -> Result<String> {
    match column {
        Ident::Name(name) => g.wrap(name),
        Ident::Raw { expression, .. } => Ok(expression.value().to_owned()),
        Ident::Sub { query, alias } => {
            Ok(format!("({}) as {}", g.compile_select(query)?, g.wrap(alias)?))
        }
    }
}

pub(super) fn wrap_table_ident<G: Grammar + ?Sized>(g: &G, table: &Ident) -> Result<String> {
    match table {
        Ident::Name(name) => Ok(g.wrap_table(name)),
        Ident::Raw { expression, .. } => Ok(expression.value().to_owned()),
        Ident::Sub { query, alias } => Ok(format!(
            "({}) as {}",
            g.compile_select(query)?,
            g.wrap_table(alias)
        )),
    }
}

pub(super) fn json_field_and_path<G: Grammar + ?Sized>(
    g: &G,
    column: &str,
) -> Result<(String, String)> {
    match column.split_once("->") {
        Some((field, path)) => Ok((g.wrap(field)?, format!(", {}", wrap_json_path(path, "->")))),
        None => Ok((g.wrap(column)?, String::new())),
    }
}
