//! SQL grammars.
//!
//! A [`Grammar`] compiles a [`Registry`] into SQL text. The trait's default
//! method bodies implement the generic (ANSI) grammar; each dialect is a
//! struct overriding only the hooks whose syntax differs.
//!
//! Compilation takes the registry by shared reference and never mutates it.
//! The bindings of a compiled statement come from the registry itself (see
//! [`Registry::bindings`]) or from the `prepare_bindings_for_*` methods for
//! statements whose value bindings are emitted in dialect-specific places.

mod escape;
mod generic;
mod json;
mod mysql;
mod postgres;
mod select;
mod sqlite;
mod sqlserver;
mod statement;
mod substitute;
mod wheres;
mod wrap;

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;

pub use escape::{INVALID_UTF8_SENTINEL, NULL_BYTE_SENTINEL, quote_string};
pub use generic::GenericGrammar;
pub use json::{JsonNode, JsonSegment, combine_json_values, parse_update_path};
pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;
pub use sqlserver::SqlServerGrammar;

use crate::config::GrammarConfig;
use crate::error::{GrammarError, Result};
use crate::registry::{
    Aggregate, Cte, Cycle, DatePart, FulltextOptions, Having, Ident, IndexHint, Join, Lock, Order,
    Registry, UpsertUpdate, Where,
};
use crate::value::{Binding, Param};

/// One inserted or updated row: column name to value, in insertion order.
pub type Row = IndexMap<String, Param>;

/// The parts of a select statement, in the order a grammar emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Aggregate,
    Columns,
    From,
    IndexHint,
    Joins,
    Wheres,
    Groups,
    Havings,
    Orders,
    Limit,
    Offset,
    Lock,
}

/// The generic component order.
pub const SELECT_COMPONENTS: [Component; 12] = [
    Component::Aggregate,
    Component::Columns,
    Component::From,
    Component::IndexHint,
    Component::Joins,
    Component::Wheres,
    Component::Groups,
    Component::Havings,
    Component::Orders,
    Component::Limit,
    Component::Offset,
    Component::Lock,
];

/// Ordering and paging of a select or of a union.
#[derive(Debug, Clone, Copy)]
pub struct Paging<'a> {
    pub orders: &'a [Order],
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// A registry as seen by the select compiler, with `*` substituted for a
/// missing column list.
#[derive(Debug)]
pub struct SelectView<'a> {
    query: &'a Registry,
    columns: Cow<'a, [Ident]>,
}

impl<'a> SelectView<'a> {
    /// Creates a view over a registry.
    #[must_use]
    pub fn new(query: &'a Registry) -> Self {
        let columns = match &query.columns {
            Some(columns) if !columns.is_empty() => Cow::Borrowed(columns.as_slice()),
            _ => Cow::Owned(vec![Ident::from("*")]),
        };
        Self { query, columns }
    }

    /// The underlying registry.
    #[must_use]
    pub const fn query(&self) -> &'a Registry {
        self.query
    }

    /// The columns to select.
    #[must_use]
    pub fn columns(&self) -> &[Ident] {
        &self.columns
    }

    /// The select's own ordering and paging.
    #[must_use]
    pub fn paging(&self) -> Paging<'a> {
        Paging {
            orders: &self.query.orders,
            limit: self.query.limit,
            offset: self.query.offset,
        }
    }
}

/// Compiles registries into SQL for one dialect.
///
/// Implementations must be immutable after construction so a single grammar
/// can be shared across threads.
pub trait Grammar: fmt::Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the configuration the grammar compiles with.
    fn config(&self) -> &GrammarConfig;

    /// Returns the table prefix.
    fn table_prefix(&self) -> &str {
        &self.config().table_prefix
    }

    // ==================== Wrapping ====================

    /// Quotes a single identifier segment. `*` is never quoted.
    fn wrap_value(&self, value: &str) -> String {
        wrap::quote(value, '"', '"')
    }

    /// Wraps a column reference: aliases, dotted segments and JSON selectors.
    fn wrap(&self, value: &str) -> Result<String> {
        wrap::wrap(self, value, false)
    }

    /// Wraps a value, optionally prefixing its alias with the table prefix.
    fn wrap_aliased(&self, value: &str, prefix_alias: bool) -> Result<String> {
        wrap::wrap(self, value, prefix_alias)
    }

    /// Wraps a table name, applying the table prefix.
    fn wrap_table(&self, table: &str) -> String {
        wrap::wrap_table(self, table)
    }

    /// Wraps a column-position reference.
    fn wrap_column(&self, column: &Ident) -> Result<String> {
        wrap::wrap_column(self, column)
    }

    /// Wraps a table-position reference.
    fn wrap_table_ident(&self, table: &Ident) -> Result<String> {
        wrap::wrap_table_ident(self, table)
    }

    /// Wraps and comma-joins columns.
    fn columnize(&self, columns: &[Ident]) -> Result<String> {
        columns
            .iter()
            .map(|column| self.wrap_column(column))
            .collect::<Result<Vec<_>>>()
            .map(|wrapped| wrapped.join(", "))
    }

    /// Returns the placeholder for a value: raw expressions inline, `?` otherwise.
    fn parameter(&self, value: &Param) -> String {
        match value {
            Param::Raw(expression) => expression.value().to_owned(),
            Param::Value(_) => String::from("?"),
        }
    }

    /// Comma-joins the placeholders of several values.
    fn parameterize(&self, values: &[&Param]) -> String {
        values
            .iter()
            .map(|value| self.parameter(value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Wraps a `column->path` selector for reading.
    fn wrap_json_selector(&self, _value: &str) -> Result<String> {
        Err(GrammarError::unsupported("JSON operations"))
    }

    /// Wraps a JSON selector compared against a boolean.
    fn wrap_json_boolean_selector(&self, value: &str) -> Result<String> {
        self.wrap_json_selector(value)
    }

    /// Wraps the boolean literal of a JSON boolean comparison.
    fn wrap_json_boolean_value(&self, value: &str) -> String {
        value.to_owned()
    }

    /// Splits `column->a->b` into the wrapped field and `, '$."a"."b"'`.
    fn wrap_json_field_and_path(&self, column: &str) -> Result<(String, String)> {
        wrap::json_field_and_path(self, column)
    }

    /// Wraps one member of a union.
    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    // ==================== Select ====================

    /// Returns the select component order.
    fn select_components(&self) -> &'static [Component] {
        &SELECT_COMPONENTS
    }

    /// Compiles a select statement.
    fn compile_select(&self, query: &Registry) -> Result<String> {
        select::compile_select(self, query)
    }

    /// Compiles an aggregate: `select count(*) as aggregate`.
    fn compile_aggregate(&self, query: &Registry, aggregate: &Aggregate) -> Result<String> {
        select::compile_aggregate(self, query, aggregate)
    }

    /// Compiles the select list.
    fn compile_columns(&self, view: &SelectView<'_>) -> Result<String> {
        let distinct = if view.query().distinct.is_set() {
            "select distinct "
        } else {
            "select "
        };
        Ok(format!("{distinct}{}", self.columnize(view.columns())?))
    }

    /// Compiles the `from` clause.
    fn compile_from(&self, _query: &Registry, from: &Ident) -> Result<String> {
        Ok(format!("from {}", self.wrap_table_ident(from)?))
    }

    /// Compiles an index hint.
    fn compile_index_hint(&self, _hint: &IndexHint) -> Result<String> {
        Err(GrammarError::unsupported("index hints"))
    }

    /// Compiles joins, including nested joins.
    fn compile_joins(&self, joins: &[Join]) -> Result<String> {
        select::compile_joins(self, joins)
    }

    /// Compiles the where list with its keyword, or nothing.
    fn compile_wheres(&self, query: &Registry) -> Result<String> {
        let conditions = wheres::compile_conditions(self, &query.wheres)?;
        if conditions.is_empty() {
            return Ok(conditions);
        }
        Ok(format!("where {conditions}"))
    }

    /// Compiles a single where predicate, without its conjunction.
    fn compile_where(&self, clause: &Where) -> Result<String> {
        wheres::compile_where(self, clause)
    }

    /// `column operator value`.
    fn where_basic(&self, column: &Ident, operator: &str, value: &Param) -> Result<String> {
        Ok(format!(
            "{} {} {}",
            self.wrap_column(column)?,
            operator.replace('?', "??"),
            self.parameter(value)
        ))
    }

    /// Operators compiled as bitwise predicates.
    fn bitwise_operators(&self) -> &'static [&'static str] {
        &["&", "|", "^", "<<", ">>", "&~"]
    }

    /// Bitwise comparison.
    fn where_bitwise(&self, column: &Ident, operator: &str, value: &Param) -> Result<String> {
        self.where_basic(column, operator, value)
    }

    /// `column is [not] null`.
    fn where_null(&self, column: &Ident, not: bool) -> Result<String> {
        let keyword = if not { "is not null" } else { "is null" };
        Ok(format!("{} {keyword}", self.wrap_column(column)?))
    }

    /// Compares a date component.
    fn where_date(
        &self,
        part: DatePart,
        column: &Ident,
        operator: &str,
        value: &Param,
    ) -> Result<String> {
        Ok(format!(
            "{}({}) {operator} {}",
            part.as_sql(),
            self.wrap_column(column)?,
            self.parameter(value)
        ))
    }

    /// Compares a JSON selector with a boolean literal.
    fn where_json_boolean(&self, column: &str, operator: &str, value: bool) -> Result<String> {
        let literal = if value { "true" } else { "false" };
        Ok(format!(
            "{} {operator} {}",
            self.wrap_json_boolean_selector(column)?,
            self.wrap_json_boolean_value(literal)
        ))
    }

    /// JSON containment; `value` is the placeholder of the JSON-encoded value.
    fn compile_json_contains(&self, _column: &str, _value: &str) -> Result<String> {
        Err(GrammarError::unsupported("JSON contains operations"))
    }

    /// JSON key existence.
    fn compile_json_contains_key(&self, _column: &str) -> Result<String> {
        Err(GrammarError::unsupported("JSON contains key operations"))
    }

    /// JSON array length comparison.
    fn compile_json_length(&self, _column: &str, _operator: &str, _value: &str) -> Result<String> {
        Err(GrammarError::unsupported("JSON length operations"))
    }

    /// Full text search.
    fn where_full_text(
        &self,
        _columns: &[Ident],
        _value: &Param,
        _options: &FulltextOptions,
    ) -> Result<String> {
        Err(GrammarError::unsupported("fulltext where clauses"))
    }

    /// Compiles `group by`, or nothing.
    fn compile_groups(&self, groups: &[Ident]) -> Result<String> {
        if groups.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("group by {}", self.columnize(groups)?))
    }

    /// Compiles the having list with its keyword, or nothing.
    fn compile_havings(&self, havings: &[Having]) -> Result<String> {
        let conditions = wheres::compile_having_conditions(self, havings)?;
        if conditions.is_empty() {
            return Ok(conditions);
        }
        Ok(format!("having {conditions}"))
    }

    /// Compiles a single having predicate, without its conjunction.
    fn compile_having(&self, having: &Having) -> Result<String> {
        wheres::compile_having(self, having)
    }

    /// Compiles `order by`, or nothing.
    fn compile_orders(&self, paging: Paging<'_>) -> Result<String> {
        select::compile_orders(self, paging.orders)
    }

    /// Random ordering expression.
    fn compile_random(&self, _seed: Option<&str>) -> String {
        String::from("RANDOM()")
    }

    /// Compiles the limit, or nothing.
    fn compile_limit(&self, paging: Paging<'_>) -> String {
        paging
            .limit
            .map(|limit| format!("limit {limit}"))
            .unwrap_or_default()
    }

    /// Compiles the offset, or nothing.
    fn compile_offset(&self, paging: Paging<'_>) -> String {
        paging
            .offset
            .map(|offset| format!("offset {offset}"))
            .unwrap_or_default()
    }

    /// Compiles a lock. Only raw lock text is understood generically.
    fn compile_lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::Raw(sql) => sql.clone(),
            Lock::Update | Lock::Shared => String::new(),
        }
    }

    /// Compiles the union members and the union-level ordering and paging.
    fn compile_unions(&self, query: &Registry) -> Result<String> {
        select::compile_unions(self, query)
    }

    /// Compiles a `with` prefix.
    fn compile_expressions(&self, expressions: &[Cte]) -> Result<String> {
        select::compile_expressions(self, expressions)
    }

    /// Keyword emitted after `with` when any expression is recursive.
    fn recursive_keyword(&self) -> &'static str {
        "recursive "
    }

    /// Materialization hint of an expression.
    fn compile_materialized(&self, _materialized: Option<bool>) -> &'static str {
        ""
    }

    /// Cycle detection clause of a recursive expression.
    fn compile_cycle(&self, _cycle: &Cycle) -> Result<String> {
        Err(GrammarError::unsupported("cycle detection"))
    }

    /// Applies a recursion limit to a compiled statement body.
    fn apply_recursion_limit(&self, sql: String, _limit: u64) -> String {
        sql
    }

    /// Compiles an existence check.
    fn compile_exists(&self, query: &Registry) -> Result<String> {
        Ok(format!(
            "select exists({}) as {}",
            self.compile_select(query)?,
            self.wrap("exists")?
        ))
    }

    /// Bindings of [`Grammar::compile_exists`].
    fn prepare_bindings_for_exists(&self, query: &Registry) -> Vec<Binding> {
        query.bindings()
    }

    // ==================== Insert ====================

    /// Compiles a batch insert. No rows (or only empty rows) insert defaults.
    fn compile_insert(&self, query: &Registry, rows: &[Row]) -> Result<String> {
        statement::compile_insert(self, query, rows)
    }

    /// Bindings of the insert compilers: every row's values, row by row.
    fn prepare_bindings_for_insert(&self, rows: &[Row]) -> Result<Vec<Binding>> {
        Ok(statement::insert_rows(rows)?.bindings())
    }

    /// Insert of a row made only of default values.
    fn compile_empty_insert(&self, table: &str) -> String {
        format!("insert into {table} default values")
    }

    /// Compiles an insert that skips rows violating constraints.
    fn compile_insert_or_ignore(&self, _query: &Registry, _rows: &[Row]) -> Result<String> {
        Err(GrammarError::unsupported("inserting while ignoring errors"))
    }

    /// Compiles an insert returning the generated key.
    fn compile_insert_get_id(
        &self,
        query: &Registry,
        row: &Row,
        _sequence: Option<&str>,
    ) -> Result<String> {
        self.compile_insert(query, std::slice::from_ref(row))
    }

    /// Compiles `insert into t (cols) <select>`.
    fn compile_insert_using(
        &self,
        query: &Registry,
        columns: &[String],
        sql: &str,
    ) -> Result<String> {
        statement::compile_insert_using(self, query, columns, sql)
    }

    /// Compiles an insert-using that skips rows violating constraints.
    fn compile_insert_or_ignore_using(
        &self,
        _query: &Registry,
        _columns: &[String],
        _sql: &str,
    ) -> Result<String> {
        Err(GrammarError::unsupported("inserting while ignoring errors"))
    }

    // ==================== Update ====================

    /// Compiles an update statement.
    fn compile_update(&self, query: &Registry, values: &Row) -> Result<String> {
        statement::compile_update(self, query, values)
    }

    /// Compiles the `set` list together with the bindings it consumes.
    fn compile_update_columns(
        &self,
        query: &Registry,
        values: &Row,
    ) -> Result<(String, Vec<Binding>)> {
        statement::compile_update_columns(self, query, values)
    }

    /// Column name used in the `set` list for an update key.
    fn update_column_name<'a>(&self, key: &'a str) -> &'a str {
        key
    }

    /// Assignment for a column updated through JSON paths.
    fn compile_json_update_column(
        &self,
        _column: &str,
        _tree: &JsonNode,
    ) -> Result<(String, Vec<Binding>)> {
        Err(GrammarError::unsupported("JSON updates"))
    }

    /// `update t set .. where ..`.
    fn compile_update_without_joins(
        &self,
        _query: &Registry,
        table: &str,
        columns: &str,
        wheres: &str,
    ) -> Result<String> {
        Ok(format!("update {table} set {columns} {wheres}"))
    }

    /// `update t <joins> set .. where ..`.
    fn compile_update_with_joins(
        &self,
        query: &Registry,
        table: &str,
        columns: &str,
        wheres: &str,
    ) -> Result<String> {
        let joins = self.compile_joins(&query.joins)?;
        Ok(format!("update {table} {joins} set {columns} {wheres}"))
    }

    /// Bindings of [`Grammar::compile_update`].
    fn prepare_bindings_for_update(&self, query: &Registry, values: &Row) -> Result<Vec<Binding>> {
        statement::bindings_for_update_after_joins(self, query, values)
    }

    /// Compiles an update reading from other tables.
    fn compile_update_from(&self, _query: &Registry, _values: &Row) -> Result<String> {
        Err(GrammarError::unsupported("update from"))
    }

    /// Bindings of [`Grammar::compile_update_from`].
    fn prepare_bindings_for_update_from(
        &self,
        _query: &Registry,
        _values: &Row,
    ) -> Result<Vec<Binding>> {
        Err(GrammarError::unsupported("update from"))
    }

    // ==================== Delete ====================

    /// Compiles a delete statement.
    fn compile_delete(&self, query: &Registry) -> Result<String> {
        statement::compile_delete(self, query)
    }

    /// `delete from t where ..`.
    fn compile_delete_without_joins(
        &self,
        _query: &Registry,
        table: &str,
        wheres: &str,
    ) -> Result<String> {
        Ok(format!("delete from {table} {wheres}"))
    }

    /// `delete alias from t <joins> where ..`.
    fn compile_delete_with_joins(
        &self,
        query: &Registry,
        table: &str,
        wheres: &str,
    ) -> Result<String> {
        let alias = wrap::alias_of(table);
        let joins = self.compile_joins(&query.joins)?;
        Ok(format!("delete {alias} from {table} {joins} {wheres}"))
    }

    /// Bindings of [`Grammar::compile_delete`].
    fn prepare_bindings_for_delete(&self, query: &Registry) -> Vec<Binding> {
        query
            .bindings_by_category()
            .flatten_except(&[crate::registry::BindingCategory::Select])
    }

    // ==================== Upsert ====================

    /// Compiles an insert that updates rows conflicting on `unique_by`.
    fn compile_upsert(
        &self,
        _query: &Registry,
        _rows: &[Row],
        _unique_by: &[String],
        _update: &[UpsertUpdate],
    ) -> Result<String> {
        Err(GrammarError::unsupported("upserts"))
    }

    /// Bindings of [`Grammar::compile_upsert`]: inserted values, then update values.
    fn prepare_bindings_for_upsert(
        &self,
        rows: &[Row],
        update: &[UpsertUpdate],
    ) -> Result<Vec<Binding>> {
        statement::bindings_for_upsert(rows, update)
    }

    // ==================== Maintenance ====================

    /// Compiles the statements emptying a table, each with its bindings.
    fn compile_truncate(&self, query: &Registry) -> Result<IndexMap<String, Vec<Binding>>> {
        let table = statement::table(self, query)?;
        Ok(IndexMap::from([(format!("truncate table {table}"), vec![])]))
    }

    /// Returns whether savepoints are supported.
    fn supports_savepoints(&self) -> bool {
        true
    }

    /// Compiles savepoint creation.
    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    /// Compiles a rollback to a savepoint.
    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    // ==================== Escaping ====================

    /// chrono format used for date-time literals.
    fn date_format(&self) -> &'static str {
        "%Y-%m-%d %H:%M:%S"
    }

    /// Escapes a binary payload.
    fn escape_binary(&self, bytes: &[u8]) -> String {
        format!("<Buffer[{}]>", bytes.len())
    }

    /// Escapes a value as a SQL literal. Never fails.
    fn escape(&self, value: &Binding) -> String {
        escape::escape(self, value)
    }

    /// Escapes a clause operand; expressions escape their text.
    fn escape_param(&self, value: &Param) -> String {
        match value {
            Param::Raw(expression) => quote_string(expression.value().as_bytes()),
            Param::Value(binding) => self.escape(binding),
        }
    }

    /// Inlines positional bindings into SQL for logging.
    fn substitute_bindings_into_raw_sql(&self, sql: &str, bindings: &[Binding]) -> String {
        let escaped = bindings.iter().map(|binding| self.escape(binding)).collect();
        substitute::positional(sql, escaped)
    }

    /// Inlines named bindings (`:key`) into SQL for logging.
    fn substitute_named_bindings(&self, sql: &str, bindings: &IndexMap<String, Binding>) -> String {
        let escaped = bindings
            .iter()
            .map(|(key, binding)| (key.trim_start_matches(':').to_owned(), self.escape(binding)))
            .collect();
        substitute::named(sql, escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_view_defaults_columns() {
        let query = Registry::table("users");
        let view = SelectView::new(&query);
        assert_eq!(view.columns(), &[Ident::from("*")]);

        let query = Registry::table("users").select(["id"]);
        let view = SelectView::new(&query);
        assert_eq!(view.columns(), &[Ident::from("id")]);
        assert_eq!(query.columns, Some(vec![Ident::from("id")]));
    }

    #[test]
    fn test_grammars_are_object_safe() {
        let grammars: Vec<Box<dyn Grammar>> = vec![
            Box::new(GenericGrammar::default()),
            Box::new(MySqlGrammar::default()),
            Box::new(PostgresGrammar::default()),
            Box::new(SqliteGrammar::default()),
            Box::new(SqlServerGrammar::default()),
        ];
        let names: Vec<&str> = grammars.iter().map(|g| g.name()).collect();
        assert_eq!(names, ["generic", "mysql", "postgres", "sqlite", "sqlserver"]);
    }
}
