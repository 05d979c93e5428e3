//! Grouping of JSON path updates into per-column document trees.
//!
//! `update(["meta->a" => 1, "meta->b->c" => 2])` must produce a single
//! assignment to `meta`. [`combine_json_values`] folds every path of a
//! column into one [`JsonNode`] tree that the dialect grammars render.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use super::wrap::{bracket_tokens, split_array_keys};
use super::Row;
use crate::error::{GrammarError, Result};
use crate::value::{Binding, Param};

/// One step of a JSON update path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

impl fmt::Display for JsonSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "\"{key}\""),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

fn parse_index(token: &str) -> Result<usize> {
    if token.starts_with('-') {
        return Err(GrammarError::invalid(format!(
            "negative array index {token} in JSON update path"
        )));
    }
    token.parse().map_err(|_| {
        GrammarError::invalid(format!("array index {token} in JSON update path is not a number"))
    })
}

/// Parses the path of `column->a->tags[0]` (everything after the first `->`).
///
/// Numeric segments (`tags->0`) and bracket groups (`tags[0]`) both become
/// [`JsonSegment::Index`].
pub fn parse_update_path(path: &str) -> Result<Vec<JsonSegment>> {
    let mut segments = Vec::new();

    for raw in path.split("->") {
        let (key, brackets) = split_array_keys(raw);
        if key.is_empty() && brackets.is_empty() {
            return Err(GrammarError::invalid("empty segment in JSON update path"));
        }
        if !key.is_empty() {
            if key.bytes().all(|b| b.is_ascii_digit()) {
                segments.push(JsonSegment::Index(parse_index(key)?));
            } else {
                segments.push(JsonSegment::Key(key.to_owned()));
            }
        }
        for token in bracket_tokens(brackets) {
            segments.push(JsonSegment::Index(parse_index(token)?));
        }
    }

    Ok(segments)
}

/// A JSON document under construction.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonNode {
    Object(IndexMap<String, JsonNode>),
    /// Sparse array; missing elements render as `null`.
    Array(BTreeMap<usize, JsonNode>),
    Leaf(Param),
}

impl JsonNode {
    fn container_for(segment: &JsonSegment) -> Self {
        match segment {
            JsonSegment::Key(_) => Self::Object(IndexMap::new()),
            JsonSegment::Index(_) => Self::Array(BTreeMap::new()),
        }
    }

    /// Builds a tree from a JSON document.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_value(value)))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (i, Self::from_value(value)))
                    .collect(),
            ),
            scalar => Self::Leaf(Param::Value(Binding::from(scalar.clone()))),
        }
    }

    /// Sets `value` at `path`, turning leaves on the way into containers.
    pub fn insert(&mut self, path: &[JsonSegment], value: Param) -> Result<()> {
        let Some((first, rest)) = path.split_first() else {
            *self = Self::Leaf(value);
            return Ok(());
        };

        if matches!(self, Self::Leaf(_)) {
            *self = Self::container_for(first);
        }

        let child = match (self, first) {
            (Self::Object(children), JsonSegment::Key(key)) => children
                .entry(key.clone())
                .or_insert_with(|| Self::Leaf(Param::Value(Binding::Null))),
            (Self::Array(items), JsonSegment::Index(index)) => items
                .entry(*index)
                .or_insert_with(|| Self::Leaf(Param::Value(Binding::Null))),
            _ => {
                return Err(GrammarError::invalid(format!(
                    "JSON update path uses {first} on a value of another kind"
                )))
            }
        };
        child.insert(rest, value)
    }

    /// Direct children with the segment leading to each.
    #[must_use]
    pub fn children(&self) -> Vec<(JsonSegment, &Self)> {
        match self {
            Self::Object(children) => children
                .iter()
                .map(|(key, node)| (JsonSegment::Key(key.clone()), node))
                .collect(),
            Self::Array(items) => items
                .iter()
                .map(|(index, node)| (JsonSegment::Index(*index), node))
                .collect(),
            Self::Leaf(_) => vec![],
        }
    }

    /// Returns true for arrays.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Renders the tree as a JSON document.
    pub fn to_json(&self) -> Result<Value> {
        match self {
            Self::Object(children) => {
                let mut map = serde_json::Map::with_capacity(children.len());
                for (key, node) in children {
                    map.insert(key.clone(), node.to_json()?);
                }
                Ok(Value::Object(map))
            }
            Self::Array(items) => {
                let len = items.keys().next_back().map_or(0, |last| last + 1);
                let mut out = vec![Value::Null; len];
                for (index, node) in items {
                    out[*index] = node.to_json()?;
                }
                Ok(Value::Array(out))
            }
            Self::Leaf(Param::Value(binding)) => Ok(binding.to_json()),
            Self::Leaf(Param::Raw(_)) => Err(GrammarError::invalid(
                "expressions cannot be embedded in JSON documents",
            )),
        }
    }

    /// Returns true for objects that can be merged as a JSON patch: no
    /// arrays, no expressions and no nulls anywhere below.
    #[must_use]
    pub fn is_patchable(&self) -> bool {
        match self {
            Self::Object(children) => children.values().all(|child| match child {
                Self::Object(_) => child.is_patchable(),
                Self::Leaf(Param::Value(binding)) => !binding.is_null(),
                Self::Leaf(Param::Raw(_)) | Self::Array(_) => false,
            }),
            Self::Array(_) | Self::Leaf(_) => false,
        }
    }
}

fn json_container(value: &Param) -> Option<&Value> {
    match value {
        Param::Value(binding) => match binding.unwrap_typed() {
            Binding::Json(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            _ => None,
        },
        Param::Raw(_) => None,
    }
}

/// Groups every `column->path` key of an update by column.
///
/// A plain object or array value for a column that also has path updates
/// becomes the base of that column's tree; paths are applied on top in
/// order. Any other plain value for such a column is rejected.
pub fn combine_json_values(values: &Row) -> Result<IndexMap<String, JsonNode>> {
    let roots: HashSet<&str> = values
        .keys()
        .filter_map(|key| key.split_once("->").map(|(column, _)| column))
        .collect();

    let mut trees: IndexMap<String, JsonNode> = IndexMap::new();

    for (key, value) in values {
        if key.contains("->") || !roots.contains(key.as_str()) {
            continue;
        }
        let Some(document) = json_container(value) else {
            return Err(GrammarError::invalid(format!(
                "column {key} is updated both as a whole and through JSON paths"
            )));
        };
        trees.insert(key.clone(), JsonNode::from_value(document));
    }

    for (key, value) in values {
        let Some((column, path)) = key.split_once("->") else {
            continue;
        };
        let segments = parse_update_path(path)?;
        let Some(first) = segments.first() else {
            continue;
        };
        trees
            .entry(column.to_owned())
            .or_insert_with(|| JsonNode::container_for(first))
            .insert(&segments, value.clone())?;
    }

    Ok(trees)
}

/// `$."a"[0]` for a segment list, single quotes doubled.
pub(crate) fn json_path(segments: &[JsonSegment]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        if matches!(segment, JsonSegment::Key(_)) {
            path.push('.');
        }
        path.push_str(&segment.to_string().replace('\'', "''"));
    }
    path
}

/// `'$."a"[0]'`.
pub(crate) fn quoted_json_path(segments: &[JsonSegment]) -> String {
    format!("'{}'", json_path(segments))
}

/// Binds a leaf as JSON text.
pub(crate) fn json_text(binding: &Binding) -> Binding {
    Binding::Text(binding.to_json().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::raw;
    use serde_json::json;

    fn key(k: &str) -> JsonSegment {
        JsonSegment::Key(String::from(k))
    }

    fn row(pairs: &[(&str, Param)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (String::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_update_path() {
        assert_eq!(
            parse_update_path("tags[0][2]").unwrap(),
            vec![key("tags"), JsonSegment::Index(0), JsonSegment::Index(2)]
        );
        assert_eq!(
            parse_update_path("tags->0->name").unwrap(),
            vec![key("tags"), JsonSegment::Index(0), key("name")]
        );
    }

    #[test]
    fn test_parse_update_path_rejects_bad_indexes() {
        assert!(matches!(
            parse_update_path("tags[-1]"),
            Err(GrammarError::InvalidClause(_))
        ));
        assert!(matches!(
            parse_update_path("tags[x]"),
            Err(GrammarError::InvalidClause(_))
        ));
    }

    #[test]
    fn test_sibling_paths_share_one_tree() {
        let values = row(&[
            ("meta->a", Param::from(1)),
            ("name", Param::from("x")),
            ("meta->b->c", Param::from(2)),
        ]);
        let trees = combine_json_values(&values).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees["meta"].to_json().unwrap(), json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_plain_document_is_the_base() {
        let values = row(&[
            ("meta->b", Param::from(2)),
            ("meta", Param::from(json!({"a": 1, "b": 0}))),
        ]);
        let trees = combine_json_values(&values).unwrap();
        assert_eq!(trees["meta"].to_json().unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_plain_scalar_with_paths_is_invalid() {
        let values = row(&[("meta->b", Param::from(2)), ("meta", Param::from(3))]);
        assert!(combine_json_values(&values).is_err());
    }

    #[test]
    fn test_arrays_fill_gaps_with_null() {
        let values = row(&[("meta->tags[2]", Param::from("x"))]);
        let trees = combine_json_values(&values).unwrap();
        assert_eq!(trees["meta"].to_json().unwrap(), json!({"tags": [null, null, "x"]}));
        assert!(!trees["meta"].is_patchable());
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let values = row(&[("meta->tags[0]", Param::from(1)), ("meta->tags->x", Param::from(2))]);
        assert!(matches!(
            combine_json_values(&values),
            Err(GrammarError::InvalidClause(_))
        ));
    }

    #[test]
    fn test_patchable() {
        let mut node = JsonNode::Object(IndexMap::new());
        node.insert(&[key("a"), key("b")], Param::from(1)).unwrap();
        assert!(node.is_patchable());
        node.insert(&[key("c")], Param::from(raw("now()"))).unwrap();
        assert!(!node.is_patchable());
        assert!(node.to_json().is_err());
    }

    #[test]
    fn test_json_path_literals() {
        let segments = vec![key("it's"), JsonSegment::Index(3)];
        assert_eq!(quoted_json_path(&segments), "'$.\"it''s\"[3]'");
        assert_eq!(json_path(&[]), "$");
    }
}
