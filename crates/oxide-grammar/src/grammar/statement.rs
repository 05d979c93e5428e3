//! Insert, update, delete and upsert assembly.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::json::combine_json_values;
use super::wrap::{is_json_selector, split_alias};
use super::{Grammar, Row};
use crate::error::{GrammarError, Result};
use crate::registry::{BindingCategory, Ident, Registry, UpsertUpdate};
use crate::value::{Binding, Param};

/// Rows of a batch insert, aligned on the first row's columns.
#[derive(Debug)]
pub(crate) struct InsertRows<'a> {
    pub columns: Vec<&'a str>,
    pub rows: Vec<Vec<&'a Param>>,
}

impl InsertRows<'_> {
    /// Bindings of every row, row by row.
    pub fn bindings(&self) -> Vec<Binding> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|param| param.binding().cloned())
            .collect()
    }

    /// Wrapped column list.
    pub fn columnize<G: Grammar + ?Sized>(&self, g: &G) -> Result<String> {
        let idents: Vec<Ident> = self.columns.iter().map(|c| Ident::from(*c)).collect();
        g.columnize(&idents)
    }

    /// `(?, ?), (?, ?)`.
    pub fn parameterize<G: Grammar + ?Sized>(&self, g: &G) -> String {
        self.rows
            .iter()
            .map(|row| format!("({})", g.parameterize(row)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Aligns rows on the first row's columns; every row must carry exactly those.
pub(crate) fn insert_rows(rows: &[Row]) -> Result<InsertRows<'_>> {
    let Some(first) = rows.first() else {
        return Ok(InsertRows {
            columns: vec![],
            rows: vec![],
        });
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut aligned = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            return Err(GrammarError::invalid(
                "every inserted row must have the same columns",
            ));
        }
        let values = columns
            .iter()
            .map(|column| {
                row.get(*column).ok_or_else(|| {
                    GrammarError::invalid(format!("inserted row is missing column {column}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        aligned.push(values);
    }

    Ok(InsertRows {
        columns,
        rows: aligned,
    })
}

/// Returns true when there is nothing but default values to insert.
pub(crate) fn is_empty_insert(rows: &[Row]) -> bool {
    rows.iter().all(IndexMap::is_empty)
}

/// The wrapped target table of a write statement.
pub(crate) fn table<G: Grammar + ?Sized>(g: &G, query: &Registry) -> Result<String> {
    match &query.from {
        Some(from) => g.wrap_table_ident(from),
        None => Err(GrammarError::invalid("statement has no target table")),
    }
}

/// Prefixes a statement with the query's `with` clause, if any.
pub(crate) fn with_expressions<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    sql: &str,
) -> Result<String> {
    let sql = sql.trim();
    if query.expressions.is_empty() {
        return Ok(sql.to_owned());
    }
    Ok(format!("{} {sql}", g.compile_expressions(&query.expressions)?))
}

pub(super) fn compile_insert<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    rows: &[Row],
) -> Result<String> {
    let table = table(g, query)?;
    if is_empty_insert(rows) {
        return Ok(g.compile_empty_insert(&table));
    }
    let rows = insert_rows(rows)?;
    Ok(format!(
        "insert into {table} ({}) values {}",
        rows.columnize(g)?,
        rows.parameterize(g)
    ))
}

pub(super) fn compile_insert_using<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    columns: &[String],
    sql: &str,
) -> Result<String> {
    let table = table(g, query)?;
    if columns.is_empty() || columns.iter().all(|c| c == "*") {
        return Ok(format!("insert into {table} {sql}"));
    }
    let idents: Vec<Ident> = columns.iter().map(Ident::from).collect();
    Ok(format!("insert into {table} ({}) {sql}", g.columnize(&idents)?))
}

pub(super) fn compile_update<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    values: &Row,
) -> Result<String> {
    let table = table(g, query)?;
    let (columns, _) = g.compile_update_columns(query, values)?;
    let wheres = g.compile_wheres(query)?;
    let sql = if query.joins.is_empty() {
        g.compile_update_without_joins(query, &table, &columns, &wheres)?
    } else {
        g.compile_update_with_joins(query, &table, &columns, &wheres)?
    };
    with_expressions(g, query, &sql)
}

pub(super) fn compile_update_columns<G: Grammar + ?Sized>(
    g: &G,
    _query: &Registry,
    values: &Row,
) -> Result<(String, Vec<Binding>)> {
    let values: Row = values
        .iter()
        .map(|(key, value)| (g.update_column_name(key).to_owned(), value.clone()))
        .collect();

    let trees = if values.keys().any(|key| is_json_selector(key)) {
        combine_json_values(&values)?
    } else {
        IndexMap::new()
    };

    let mut assignments = Vec::with_capacity(values.len());
    let mut bindings = Vec::new();
    let mut emitted = HashSet::new();

    for (key, value) in &values {
        let root = key.split_once("->").map_or(key.as_str(), |(column, _)| column);
        if let Some(tree) = trees.get(root) {
            if emitted.insert(root) {
                let (sql, tree_bindings) = g.compile_json_update_column(root, tree)?;
                assignments.push(sql);
                bindings.extend(tree_bindings);
            }
            continue;
        }
        assignments.push(format!("{} = {}", g.wrap(key)?, g.parameter(value)));
        bindings.extend(value.binding().cloned());
    }

    Ok((assignments.join(", "), bindings))
}

/// `with`, from and join bindings, then the values, then everything else.
pub(super) fn bindings_for_update_after_joins<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    values: &Row,
) -> Result<Vec<Binding>> {
    use BindingCategory::{Expressions, From, Join, Select, UnionExpressions};

    let bindings = query.bindings_by_category();
    let (_, value_bindings) = g.compile_update_columns(query, values)?;

    let mut out = bindings.flatten_only(&[UnionExpressions, Expressions, From, Join]);
    out.extend(value_bindings);
    out.extend(bindings.flatten_except(&[UnionExpressions, Expressions, Select, From, Join]));
    Ok(out)
}

/// `with` bindings, then the values, then everything else.
pub(crate) fn bindings_for_update_values_first<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    values: &Row,
) -> Result<Vec<Binding>> {
    use BindingCategory::{Expressions, Select, UnionExpressions};

    let bindings = query.bindings_by_category();
    let (_, value_bindings) = g.compile_update_columns(query, values)?;

    let mut out = bindings.flatten_only(&[UnionExpressions, Expressions]);
    out.extend(value_bindings);
    out.extend(bindings.flatten_except(&[UnionExpressions, Expressions, Select]));
    Ok(out)
}

pub(super) fn compile_delete<G: Grammar + ?Sized>(g: &G, query: &Registry) -> Result<String> {
    let table = table(g, query)?;
    let wheres = g.compile_wheres(query)?;
    let sql = if query.joins.is_empty() {
        g.compile_delete_without_joins(query, &table, &wheres)?
    } else {
        g.compile_delete_with_joins(query, &table, &wheres)?
    };
    with_expressions(g, query, &sql)
}

pub(super) fn bindings_for_upsert(rows: &[Row], update: &[UpsertUpdate]) -> Result<Vec<Binding>> {
    let mut out = insert_rows(rows)?.bindings();
    for assignment in update {
        if let UpsertUpdate::Value(_, value) = assignment {
            out.extend(value.binding().cloned());
        }
    }
    Ok(out)
}

/// The unwrapped alias, or name, of a write statement's target table.
pub(crate) fn target_alias(query: &Registry) -> Result<String> {
    match &query.from {
        Some(Ident::Name(name)) => Ok(split_alias(name)
            .map_or(name.as_str(), |(_, alias)| alias)
            .to_owned()),
        Some(Ident::Sub { alias, .. }) => Ok(alias.clone()),
        Some(Ident::Raw { .. }) | None => Err(GrammarError::invalid(
            "joined or limited writes need a named target table",
        )),
    }
}

/// Selects the row identifiers a joined or limited write affects.
pub(crate) fn row_id_select<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    row_id: &str,
) -> Result<String> {
    let alias = target_alias(query)?;
    let mut select = query.clone();
    select.columns = Some(vec![Ident::from(format!("{alias}.{row_id}"))]);
    select.expressions.clear();
    g.compile_select(&select)
}

/// Rejects an upsert without conflict columns.
pub(crate) fn require_unique_by(unique_by: &[String]) -> Result<()> {
    if unique_by.is_empty() {
        return Err(GrammarError::invalid("upsert needs at least one unique column"));
    }
    Ok(())
}

/// `a, b` for a list of plain column names.
pub(crate) fn columnize_names<G: Grammar + ?Sized>(g: &G, names: &[String]) -> Result<String> {
    let idents: Vec<Ident> = names.iter().map(Ident::from).collect();
    g.columnize(&idents)
}
