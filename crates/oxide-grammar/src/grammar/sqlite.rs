//! SQLite grammar.

use indexmap::IndexMap;

use super::json::{json_text, quoted_json_path, JsonNode, JsonSegment};
use super::statement::{
    self, bindings_for_update_values_first, columnize_names, require_unique_by, row_id_select,
    table, with_expressions,
};
use super::wrap::{self, split_alias};
use super::{Grammar, Row};
use crate::config::GrammarConfig;
use crate::error::{GrammarError, Result};
use crate::registry::{DatePart, Ident, IndexHint, IndexHintKind, Lock, Registry, UpsertUpdate};
use crate::value::{Binding, Param};

/// SQLite grammar.
#[derive(Debug, Clone, Default)]
pub struct SqliteGrammar {
    config: GrammarConfig,
}

impl SqliteGrammar {
    /// Creates a SQLite grammar.
    #[must_use]
    pub const fn new(config: GrammarConfig) -> Self {
        Self { config }
    }

    /// Appends `json_set` path/value pairs for the children of `node`.
    fn json_set_pairs(
        &self,
        field: &str,
        node: &JsonNode,
        path: &mut Vec<JsonSegment>,
        pairs: &mut Vec<String>,
        bindings: &mut Vec<Binding>,
    ) -> Result<()> {
        for (segment, child) in node.children() {
            path.push(segment);
            let literal = quoted_json_path(path);
            match child {
                JsonNode::Leaf(Param::Raw(expression)) => {
                    pairs.push(format!("{literal}, {}", expression.value()));
                }
                JsonNode::Leaf(Param::Value(binding)) => {
                    pairs.push(format!("{literal}, json(?)"));
                    bindings.push(json_text(binding));
                }
                JsonNode::Object(_) if child.is_patchable() => {
                    pairs.push(format!(
                        "{literal}, json_patch(ifnull(json_extract({field}, {literal}), '{{}}'), json(?))"
                    ));
                    bindings.push(Binding::Text(child.to_json()?.to_string()));
                }
                JsonNode::Object(_) | JsonNode::Array(_) => {
                    let empty = if child.is_array() { "'[]'" } else { "'{}'" };
                    pairs.push(format!(
                        "{literal}, json(ifnull(json_extract({field}, {literal}), {empty}))"
                    ));
                    self.json_set_pairs(field, child, path, pairs, bindings)?;
                }
            }
            path.pop();
        }
        Ok(())
    }
}

impl Grammar for SqliteGrammar {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn wrap_json_selector(&self, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(value)?;
        Ok(format!("json_extract({field}{path})"))
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql})")
    }

    fn compile_index_hint(&self, hint: &IndexHint) -> Result<String> {
        Ok(match hint.kind {
            IndexHintKind::Force => format!("indexed by {}", hint.index),
            IndexHintKind::Hint | IndexHintKind::Ignore => String::new(),
        })
    }

    fn where_date(
        &self,
        part: DatePart,
        column: &Ident,
        operator: &str,
        value: &Param,
    ) -> Result<String> {
        let format = match part {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Time => "%H:%M:%S",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        Ok(format!(
            "strftime('{format}', {}) {operator} cast({} as text)",
            self.wrap_column(column)?,
            self.parameter(value)
        ))
    }

    fn compile_json_contains_key(&self, column: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!("json_type({field}{path}) is not null"))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!("json_array_length({field}{path}) {operator} {value}"))
    }

    fn compile_lock(&self, _lock: &Lock) -> String {
        String::new()
    }

    fn compile_materialized(&self, materialized: Option<bool>) -> &'static str {
        match materialized {
            Some(true) => "materialized ",
            Some(false) => "not materialized ",
            None => "",
        }
    }

    fn compile_insert_or_ignore(&self, query: &Registry, rows: &[Row]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        Ok(sql.replacen("insert", "insert or ignore", 1))
    }

    fn compile_insert_or_ignore_using(
        &self,
        query: &Registry,
        columns: &[String],
        sql: &str,
    ) -> Result<String> {
        let sql = self.compile_insert_using(query, columns, sql)?;
        Ok(sql.replacen("insert", "insert or ignore", 1))
    }

    fn update_column_name<'a>(&self, key: &'a str) -> &'a str {
        wrap::strip_table_qualifier(key)
    }

    fn compile_json_update_column(
        &self,
        column: &str,
        tree: &JsonNode,
    ) -> Result<(String, Vec<Binding>)> {
        let field = self.wrap(column)?;
        if tree.is_patchable() {
            return Ok((
                format!("{field} = json_patch(ifnull({field}, json('{{}}')), json(?))"),
                vec![Binding::Text(tree.to_json()?.to_string())],
            ));
        }

        let empty = if tree.is_array() { "json('[]')" } else { "json('{}')" };
        let mut pairs = Vec::new();
        let mut bindings = Vec::new();
        self.json_set_pairs(&field, tree, &mut vec![], &mut pairs, &mut bindings)?;
        Ok((
            format!("{field} = json_set(ifnull({field}, {empty}), {})", pairs.join(", ")),
            bindings,
        ))
    }

    fn compile_update(&self, query: &Registry, values: &Row) -> Result<String> {
        if query.joins.is_empty() && query.limit.is_none() {
            return statement::compile_update(self, query, values);
        }
        let table = table(self, query)?;
        let (columns, _) = self.compile_update_columns(query, values)?;
        let sql = format!(
            "update {table} set {columns} where {} in ({})",
            self.wrap("rowid")?,
            row_id_select(self, query, "rowid")?
        );
        with_expressions(self, query, &sql)
    }

    fn prepare_bindings_for_update(&self, query: &Registry, values: &Row) -> Result<Vec<Binding>> {
        bindings_for_update_values_first(self, query, values)
    }

    fn compile_delete(&self, query: &Registry) -> Result<String> {
        if query.joins.is_empty() && query.limit.is_none() {
            return statement::compile_delete(self, query);
        }
        let table = table(self, query)?;
        let sql = format!(
            "delete from {table} where {} in ({})",
            self.wrap("rowid")?,
            row_id_select(self, query, "rowid")?
        );
        with_expressions(self, query, &sql)
    }

    fn compile_upsert(
        &self,
        query: &Registry,
        rows: &[Row],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<String> {
        require_unique_by(unique_by)?;
        let mut assignments = Vec::with_capacity(update.len());
        for assignment in update {
            assignments.push(match assignment {
                UpsertUpdate::Column(column) => format!(
                    "{} = {}.{}",
                    self.wrap(column)?,
                    self.wrap_value("excluded"),
                    self.wrap(column)?
                ),
                UpsertUpdate::Value(column, value) => {
                    format!("{} = {}", self.wrap(column)?, self.parameter(value))
                }
            });
        }
        Ok(format!(
            "{} on conflict ({}) do update set {}",
            self.compile_insert(query, rows)?,
            columnize_names(self, unique_by)?,
            assignments.join(", ")
        ))
    }

    fn compile_truncate(&self, query: &Registry) -> Result<IndexMap<String, Vec<Binding>>> {
        let name = query
            .from
            .as_ref()
            .and_then(Ident::as_name)
            .map(|name| split_alias(name).map_or(name, |(table, _)| table))
            .ok_or_else(|| GrammarError::invalid("truncate needs a named table"))?;
        let sequence = Binding::Text(format!("{}{name}", self.table_prefix()));
        Ok(IndexMap::from([
            (
                String::from("delete from sqlite_sequence where name = ?"),
                vec![sequence],
            ),
            (format!("delete from {}", table(self, query)?), vec![]),
        ]))
    }
}
