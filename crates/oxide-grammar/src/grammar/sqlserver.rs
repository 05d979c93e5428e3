//! SQL Server grammar.

use super::json::{json_path, quoted_json_path, JsonNode, JsonSegment};
use super::statement::{
    bindings_for_update_values_first, insert_rows, require_unique_by, table, target_alias,
};
use super::{select, wrap, Component, Grammar, Paging, Row, SelectView};
use crate::config::GrammarConfig;
use crate::error::{GrammarError, Result};
use crate::registry::{
    BindingCategory, DatePart, Ident, IndexHint, IndexHintKind, Lock, Registry, UpsertUpdate,
};
use crate::value::{Binding, Param};

/// Offset precedes limit: `offset n rows fetch next m rows only`.
const SQLSERVER_COMPONENTS: [Component; 12] = [
    Component::Aggregate,
    Component::Columns,
    Component::From,
    Component::IndexHint,
    Component::Joins,
    Component::Wheres,
    Component::Groups,
    Component::Havings,
    Component::Orders,
    Component::Offset,
    Component::Limit,
    Component::Lock,
];

/// Source alias of the merged rows in an upsert.
const MERGE_SOURCE: &str = "laravel_source";

/// SQL Server grammar.
#[derive(Debug, Clone, Default)]
pub struct SqlServerGrammar {
    config: GrammarConfig,
}

/// `tags[3]` gives `("tags", "3")`.
fn trailing_index(segment: &str) -> Option<(&str, &str)> {
    let body = segment.strip_suffix(']')?;
    let open = body.rfind('[')?;
    let index = &body[open + 1..];
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&segment[..open], index))
}

impl SqlServerGrammar {
    /// Creates a SQL Server grammar.
    #[must_use]
    pub const fn new(config: GrammarConfig) -> Self {
        Self { config }
    }

    /// Folds the children of `node` into nested `json_modify` calls over `acc`.
    fn json_modify_fold(
        &self,
        field: &str,
        node: &JsonNode,
        acc: String,
        path: &mut Vec<JsonSegment>,
        bindings: &mut Vec<Binding>,
    ) -> Result<String> {
        let mut acc = acc;
        for (segment, child) in node.children() {
            let parent = json_path(path);
            let index = match &segment {
                JsonSegment::Index(index) => Some(*index),
                JsonSegment::Key(_) => None,
            };
            path.push(segment);
            let literal = quoted_json_path(path);
            // array slots that do not exist yet are appended
            let target = match index {
                Some(index) => format!(
                    "case when (select count(*) from openjson({field}, '{parent}')) > {index} then {literal} else 'append {parent}' end"
                ),
                None => literal.clone(),
            };
            acc = match child {
                JsonNode::Leaf(Param::Raw(expression)) => {
                    format!("json_modify({acc}, {target}, {})", expression.value())
                }
                // lax mode deletes the key on null, so clear it then set in strict mode
                JsonNode::Leaf(Param::Value(binding)) if binding.is_null() => {
                    let strict = literal.replacen("'$", "'strict $", 1);
                    format!("json_modify(json_modify({acc}, {target}, ''), {strict}, null)")
                }
                JsonNode::Leaf(Param::Value(binding)) => {
                    bindings.push(binding.clone());
                    format!("json_modify({acc}, {target}, ?)")
                }
                JsonNode::Object(_) | JsonNode::Array(_) => {
                    let empty = if child.is_array() { "'[]'" } else { "'{}'" };
                    let ensured = format!(
                        "json_modify({acc}, {target}, json_query(isnull(json_query({field}, {literal}), {empty})))"
                    );
                    self.json_modify_fold(field, child, ensured, path, bindings)?
                }
            };
            path.pop();
        }
        Ok(acc)
    }
}

impl Grammar for SqlServerGrammar {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn wrap_value(&self, value: &str) -> String {
        wrap::quote(value, '[', ']')
    }

    fn wrap_json_selector(&self, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(value)?;
        Ok(format!("json_value({field}{path})"))
    }

    fn wrap_json_boolean_value(&self, value: &str) -> String {
        format!("'{value}'")
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql}) as {}", self.wrap_table("temp_table"))
    }

    fn select_components(&self) -> &'static [Component] {
        &SQLSERVER_COMPONENTS
    }

    fn compile_columns(&self, view: &SelectView<'_>) -> Result<String> {
        let query = view.query();
        let mut select = String::from(if query.distinct.is_set() {
            "select distinct "
        } else {
            "select "
        });
        if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
            if query.offset.unwrap_or(0) == 0 {
                select.push_str(&format!("top {limit} "));
            }
        }
        Ok(format!("{select}{}", self.columnize(view.columns())?))
    }

    fn compile_from(&self, query: &Registry, from: &Ident) -> Result<String> {
        let from = format!("from {}", self.wrap_table_ident(from)?);
        Ok(match &query.lock {
            Some(Lock::Update) => format!("{from} with(rowlock,updlock,holdlock)"),
            Some(Lock::Shared) => format!("{from} with(rowlock,holdlock)"),
            Some(Lock::Raw(sql)) => format!("{from} {sql}"),
            None => from,
        })
    }

    fn compile_index_hint(&self, hint: &IndexHint) -> Result<String> {
        Ok(match hint.kind {
            IndexHintKind::Force => format!("with (index({}))", hint.index),
            IndexHintKind::Hint | IndexHintKind::Ignore => String::new(),
        })
    }

    fn where_bitwise(&self, column: &Ident, operator: &str, value: &Param) -> Result<String> {
        Ok(format!(
            "({} {operator} {}) != 0",
            self.wrap_column(column)?,
            self.parameter(value)
        ))
    }

    fn where_date(
        &self,
        part: DatePart,
        column: &Ident,
        operator: &str,
        value: &Param,
    ) -> Result<String> {
        let column = self.wrap_column(column)?;
        let value = self.parameter(value);
        Ok(match part {
            DatePart::Date => format!("cast({column} as date) {operator} {value}"),
            DatePart::Time => format!("cast({column} as time) {operator} {value}"),
            DatePart::Day | DatePart::Month | DatePart::Year => {
                format!("{}({column}) {operator} {value}", part.as_sql())
            }
        })
    }

    fn compile_json_contains(&self, column: &str, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!(
            "json_value(concat('[', {value}, ']'), '$[0]') in (select [value] from openjson({field}{path}))"
        ))
    }

    fn compile_json_contains_key(&self, column: &str) -> Result<String> {
        let (head, last) = column.rsplit_once("->").unwrap_or(("", column));
        let mut segments: Vec<&str> = if head.is_empty() {
            vec![]
        } else {
            head.split("->").collect()
        };
        let key = match trailing_index(last) {
            Some((before, index)) => {
                segments.push(before);
                index.to_owned()
            }
            None => format!("'{}'", last.replace('\'', "''")),
        };
        if segments.is_empty() {
            return Err(GrammarError::invalid("JSON key checks need a column and a path"));
        }
        let (field, path) = self.wrap_json_field_and_path(&segments.join("->"))?;
        Ok(format!("{key} in (select [key] from openjson({field}{path}))"))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!(
            "(select count(*) from openjson({field}{path})) {operator} {value}"
        ))
    }

    fn compile_orders(&self, paging: Paging<'_>) -> Result<String> {
        if paging.orders.is_empty() && paging.offset.unwrap_or(0) > 0 {
            return Ok(String::from("order by (SELECT 0)"));
        }
        select::compile_orders(self, paging.orders)
    }

    fn compile_random(&self, _seed: Option<&str>) -> String {
        String::from("NEWID()")
    }

    fn compile_limit(&self, paging: Paging<'_>) -> String {
        match (paging.limit, paging.offset) {
            (Some(limit), Some(offset)) if limit > 0 && offset > 0 => {
                format!("fetch next {limit} rows only")
            }
            _ => String::new(),
        }
    }

    fn compile_offset(&self, paging: Paging<'_>) -> String {
        match paging.offset {
            Some(offset) if offset > 0 => format!("offset {offset} rows"),
            _ => String::new(),
        }
    }

    fn compile_lock(&self, _lock: &Lock) -> String {
        String::new()
    }

    fn compile_unions(&self, query: &Registry) -> Result<String> {
        let mut parts = Vec::with_capacity(query.unions.len() + 3);
        for union in &query.unions {
            let keyword = if union.all { "union all" } else { "union" };
            let member = self.wrap_union(&self.compile_select(&union.query)?);
            parts.push(format!("{keyword} {member}"));
        }

        if query.union_limit.is_none() && query.union_offset.is_none() {
            let orders = select::compile_orders(self, &query.union_orders)?;
            if !orders.is_empty() {
                parts.push(orders);
            }
            return Ok(parts.join(" "));
        }

        if query.union_orders.is_empty() {
            parts.push(String::from("order by (SELECT 0)"));
        } else {
            parts.push(select::compile_orders(self, &query.union_orders)?);
        }
        parts.push(format!("offset {} rows", query.union_offset.unwrap_or(0)));
        if let Some(limit) = query.union_limit {
            parts.push(format!("fetch next {limit} rows only"));
        }
        Ok(parts.join(" "))
    }

    fn recursive_keyword(&self) -> &'static str {
        ""
    }

    fn apply_recursion_limit(&self, sql: String, limit: u64) -> String {
        format!("{sql} option (maxrecursion {limit})")
    }

    fn compile_exists(&self, query: &Registry) -> Result<String> {
        let mut exists = query.clone();
        exists.columns = Some(vec![Ident::raw(
            format!("1 {}", self.wrap_value("exists")),
            vec![],
        )]);
        exists.limit = Some(1);
        self.compile_select(&exists)
    }

    fn prepare_bindings_for_exists(&self, query: &Registry) -> Vec<Binding> {
        query
            .bindings_by_category()
            .flatten_except(&[BindingCategory::Select])
    }

    fn compile_insert_get_id(
        &self,
        query: &Registry,
        row: &Row,
        sequence: Option<&str>,
    ) -> Result<String> {
        Ok(format!(
            "set nocount on;{};select scope_identity() as {}",
            self.compile_insert(query, std::slice::from_ref(row))?,
            self.wrap(sequence.unwrap_or("id"))?
        ))
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
        let empty = if tree.is_array() { "'[]'" } else { "'{}'" };
        let mut bindings = Vec::new();
        let sql = self.json_modify_fold(
            &field,
            tree,
            format!("isnull({field}, {empty})"),
            &mut vec![],
            &mut bindings,
        )?;
        Ok((format!("{field} = {sql}"), bindings))
    }

    fn compile_update_with_joins(
        &self,
        query: &Registry,
        table: &str,
        columns: &str,
        wheres: &str,
    ) -> Result<String> {
        let alias = wrap::alias_of(table);
        let joins = self.compile_joins(&query.joins)?;
        Ok(format!("update {alias} set {columns} from {table} {joins} {wheres}"))
    }

    fn prepare_bindings_for_update(&self, query: &Registry, values: &Row) -> Result<Vec<Binding>> {
        bindings_for_update_values_first(self, query, values)
    }

    fn compile_delete_without_joins(
        &self,
        query: &Registry,
        table: &str,
        wheres: &str,
    ) -> Result<String> {
        let sql = format!("delete from {table} {wheres}");
        match query.limit {
            Some(limit) if limit > 0 && query.offset.unwrap_or(0) == 0 => {
                Ok(sql.replacen("delete", &format!("delete top ({limit})"), 1))
            }
            _ => Ok(sql),
        }
    }

    fn compile_upsert(
        &self,
        query: &Registry,
        rows: &[Row],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<String> {
        require_unique_by(unique_by)?;
        let rows = insert_rows(rows)?;
        if rows.columns.is_empty() {
            return Err(GrammarError::invalid("upsert needs at least one row"));
        }

        let target = target_alias(query)?;
        let columns = rows.columnize(self)?;
        let mut sql = format!(
            "merge {} using (values {}) {} ({columns}) ",
            table(self, query)?,
            rows.parameterize(self),
            self.wrap_table(MERGE_SOURCE)
        );

        let on = unique_by
            .iter()
            .map(|column| {
                Ok(format!(
                    "{} = {}",
                    self.wrap(&format!("{MERGE_SOURCE}.{column}"))?,
                    self.wrap(&format!("{target}.{column}"))?
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(&format!("on {} ", on.join(" and ")));

        if !update.is_empty() {
            let assignments = update
                .iter()
                .map(|assignment| match assignment {
                    UpsertUpdate::Column(column) => Ok(format!(
                        "{} = {}",
                        self.wrap(column)?,
                        self.wrap(&format!("{MERGE_SOURCE}.{column}"))?
                    )),
                    UpsertUpdate::Value(column, value) => {
                        Ok(format!("{} = {}", self.wrap(column)?, self.parameter(value)))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!("when matched then update set {} ", assignments.join(", ")));
        }

        sql.push_str(&format!(
            "when not matched then insert ({columns}) values ({columns});"
        ));
        Ok(sql)
    }

    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {name}")
    }

    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {name}")
    }

    fn date_format(&self) -> &'static str {
        "%Y-%m-%d %H:%M:%S%.3f"
    }

    fn escape_binary(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(2 + bytes.len() * 2);
        out.push_str("0x");
        for byte in bytes {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}
