//! MySQL grammar.

use super::json::{json_text, quoted_json_path, JsonNode, JsonSegment};
use super::{wrap, Grammar, Paging, Row};
use crate::config::GrammarConfig;
use crate::error::Result;
use crate::registry::{
    FulltextOptions, Ident, IndexHint, IndexHintKind, Lock, Registry, UpsertUpdate,
};
use crate::value::{Binding, Param};

/// Alias of the incoming row in the aliased upsert form.
const UPSERT_ALIAS: &str = "laravel_upsert_alias";

/// MySQL grammar.
#[derive(Debug, Clone, Default)]
pub struct MySqlGrammar {
    config: GrammarConfig,
}

impl MySqlGrammar {
    /// Creates a MySQL grammar.
    #[must_use]
    pub const fn new(config: GrammarConfig) -> Self {
        Self { config }
    }

    /// Appends the `json_set` path/value pairs for the children of `node`.
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
                    pairs.push(format!("{literal}, cast(? as json)"));
                    bindings.push(json_text(binding));
                }
                JsonNode::Object(_) if child.is_patchable() => {
                    pairs.push(format!(
                        "{literal}, json_merge_patch(ifnull(json_extract({field}, {literal}), json_object()), cast(? as json))"
                    ));
                    bindings.push(Binding::Text(child.to_json()?.to_string()));
                }
                JsonNode::Object(_) | JsonNode::Array(_) => {
                    let empty = if child.is_array() { "json_array()" } else { "json_object()" };
                    pairs.push(format!(
                        "{literal}, ifnull(json_extract({field}, {literal}), {empty})"
                    ));
                    self.json_set_pairs(field, child, path, pairs, bindings)?;
                }
            }
            path.pop();
        }
        Ok(())
    }

    fn with_orders_and_limit(&self, query: &Registry, sql: String) -> Result<String> {
        let paging = Paging {
            orders: &query.orders,
            limit: query.limit,
            offset: None,
        };
        let mut sql = sql.trim_end().to_owned();
        let orders = self.compile_orders(paging)?;
        if !orders.is_empty() {
            sql = format!("{sql} {orders}");
        }
        let limit = self.compile_limit(paging);
        if !limit.is_empty() {
            sql = format!("{sql} {limit}");
        }
        Ok(sql)
    }
}

/// Offset of the `select` that opens the statement's own query block,
/// skipping any leading expression list and union parentheses.
fn statement_select(sql: &str) -> Option<usize> {
    let base = sql.len() - sql.trim_start_matches('(').len();
    let mut depth = 0usize;
    let mut previous = ' ';
    for (at, c) in sql.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {
                if depth == base
                    && (previous == ' ' || previous == '(')
                    && sql[at..].starts_with("select")
                {
                    return Some(at);
                }
            }
        }
        previous = c;
    }
    None
}

impl Grammar for MySqlGrammar {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn wrap_value(&self, value: &str) -> String {
        wrap::quote(value, '`', '`')
    }

    fn wrap_json_selector(&self, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(value)?;
        Ok(format!("json_unquote(json_extract({field}{path}))"))
    }

    fn wrap_json_boolean_selector(&self, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(value)?;
        Ok(format!("json_extract({field}{path})"))
    }

    fn compile_index_hint(&self, hint: &IndexHint) -> Result<String> {
        let keyword = match hint.kind {
            IndexHintKind::Hint => "use",
            IndexHintKind::Force => "force",
            IndexHintKind::Ignore => "ignore",
        };
        Ok(format!("{keyword} index ({})", hint.index))
    }

    fn where_null(&self, column: &Ident, not: bool) -> Result<String> {
        if let Some(name) = column.as_name().filter(|name| wrap::is_json_selector(name)) {
            let (field, path) = self.wrap_json_field_and_path(name)?;
            let extract = format!("json_extract({field}{path})");
            return Ok(if not {
                format!("({extract} is not null AND json_type({extract}) != 'NULL')")
            } else {
                format!("({extract} is null OR json_type({extract}) = 'NULL')")
            });
        }
        let keyword = if not { "is not null" } else { "is null" };
        Ok(format!("{} {keyword}", self.wrap_column(column)?))
    }

    fn compile_json_contains(&self, column: &str, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!("json_contains({field}, {value}{path})"))
    }

    fn compile_json_contains_key(&self, column: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!("ifnull(json_contains_path({field}, 'one'{path}), 0)"))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> Result<String> {
        let (field, path) = self.wrap_json_field_and_path(column)?;
        Ok(format!("json_length({field}{path}) {operator} {value}"))
    }

    fn where_full_text(
        &self,
        columns: &[Ident],
        value: &Param,
        options: &FulltextOptions,
    ) -> Result<String> {
        let boolean = options.mode.as_deref() == Some("boolean");
        let mode = if boolean {
            " in boolean mode"
        } else {
            " in natural language mode"
        };
        let expanded = if options.expanded && !boolean {
            " with query expansion"
        } else {
            ""
        };
        Ok(format!(
            "match ({}) against ({}{mode}{expanded})",
            self.columnize(columns)?,
            self.parameter(value)
        ))
    }

    fn compile_random(&self, seed: Option<&str>) -> String {
        format!("RAND({})", seed.unwrap_or_default())
    }

    fn compile_lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::Update => String::from("for update"),
            Lock::Shared => String::from("lock in share mode"),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    fn apply_recursion_limit(&self, sql: String, limit: u64) -> String {
        match statement_select(&sql) {
            Some(at) => format!(
                "{}select /*+ SET_VAR(cte_max_recursion_depth={limit}) */{}",
                &sql[..at],
                &sql[at + "select".len()..]
            ),
            None => sql,
        }
    }

    fn compile_empty_insert(&self, table: &str) -> String {
        format!("insert into {table} () values ()")
    }

    fn compile_insert_or_ignore(&self, query: &Registry, rows: &[Row]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        Ok(sql.replacen("insert", "insert ignore", 1))
    }

    fn compile_insert_or_ignore_using(
        &self,
        query: &Registry,
        columns: &[String],
        sql: &str,
    ) -> Result<String> {
        let sql = self.compile_insert_using(query, columns, sql)?;
        Ok(sql.replacen("insert", "insert ignore", 1))
    }

    fn compile_json_update_column(
        &self,
        column: &str,
        tree: &JsonNode,
    ) -> Result<(String, Vec<Binding>)> {
        let field = self.wrap(column)?;
        let empty = if tree.is_array() { "json_array()" } else { "json_object()" };
        let base = format!("ifnull({field}, {empty})");

        let mut pairs = Vec::new();
        let mut bindings = Vec::new();
        self.json_set_pairs(&field, tree, &mut vec![], &mut pairs, &mut bindings)?;

        if pairs.is_empty() {
            return Ok((format!("{field} = {base}"), bindings));
        }
        Ok((
            format!("{field} = json_set({base}, {})", pairs.join(", ")),
            bindings,
        ))
    }

    fn compile_update_without_joins(
        &self,
        query: &Registry,
        table: &str,
        columns: &str,
        wheres: &str,
    ) -> Result<String> {
        self.with_orders_and_limit(query, format!("update {table} set {columns} {wheres}"))
    }

    fn compile_delete_without_joins(
        &self,
        query: &Registry,
        table: &str,
        wheres: &str,
    ) -> Result<String> {
        self.with_orders_and_limit(query, format!("delete from {table} {wheres}"))
    }

    fn compile_upsert(
        &self,
        query: &Registry,
        rows: &[Row],
        _unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<String> {
        let use_alias = self.config.use_upsert_alias;
        let mut sql = self.compile_insert(query, rows)?;
        if use_alias {
            sql.push_str(&format!(" as {}", self.wrap(UPSERT_ALIAS)?));
        }
        sql.push_str(" on duplicate key update ");

        let mut assignments = Vec::with_capacity(update.len());
        for assignment in update {
            assignments.push(match assignment {
                UpsertUpdate::Value(column, value) => {
                    format!("{} = {}", self.wrap(column)?, self.parameter(value))
                }
                UpsertUpdate::Column(column) if use_alias => format!(
                    "{} = {}.{}",
                    self.wrap(column)?,
                    self.wrap(UPSERT_ALIAS)?,
                    self.wrap(column)?
                ),
                UpsertUpdate::Column(column) => {
                    let wrapped = self.wrap(column)?;
                    format!("{wrapped} = values({wrapped})")
                }
            });
        }
        sql.push_str(&assignments.join(", "));
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Direction, FulltextOptions};

    fn row(pairs: &[(&str, Param)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (String::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn test_json_selector_where() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users").where_clause("items->sku", "=", "foo-bar");
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "select * from `users` where json_unquote(json_extract(`items`, '$.\"sku\"')) = ?"
        );
    }

    #[test]
    fn test_json_boolean_and_null() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users")
            .where_clause("meta->active", "=", true)
            .where_null("meta->deleted");
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "select * from `users` where json_extract(`meta`, '$.\"active\"') = true and (json_extract(`meta`, '$.\"deleted\"') is null OR json_type(json_extract(`meta`, '$.\"deleted\"')) = 'NULL')"
        );
        assert!(query.bindings().is_empty());
    }

    #[test]
    fn test_json_contains_length_and_key() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users")
            .where_json_contains("options->languages", serde_json::json!(["en"]))
            .where_json_length("options->tags", ">", 1)
            .where_json_doesnt_contain_key("options->x");
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "select * from `users` where json_contains(`options`, ?, '$.\"languages\"') and json_length(`options`, '$.\"tags\"') > ? and not ifnull(json_contains_path(`options`, 'one', '$.\"x\"'), 0)"
        );
        assert_eq!(
            query.bindings(),
            vec![Binding::Text(String::from("[\"en\"]")), Binding::Int(1)]
        );
    }

    #[test]
    fn test_fulltext() {
        let g = MySqlGrammar::default();
        let options = FulltextOptions {
            expanded: true,
            ..FulltextOptions::default()
        };
        let query = Registry::table("posts").where_full_text(["title", "body"], "rust", options);
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "select * from `posts` where match (`title`, `body`) against (? in natural language mode with query expansion)"
        );
    }

    #[test]
    fn test_index_hint_lock_and_random() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users")
            .force_index("idx_email")
            .in_random_order(Some("7"))
            .shared_lock();
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "select * from `users` force index (idx_email) order by RAND(7) lock in share mode"
        );
    }

    #[test]
    fn test_recursion_limit_hint() {
        let g = MySqlGrammar::default();
        let query = Registry::table("tree")
            .with_recursive_expression("tree", Registry::new().select_raw("1", vec![]), &["n"])
            .recursion_limit(50);
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "with recursive `tree` (`n`) as (select 1) select /*+ SET_VAR(cte_max_recursion_depth=50) */ * from `tree`"
        );
    }

    #[test]
    fn test_recursion_limit_hint_with_union() {
        let g = MySqlGrammar::default();
        let query = Registry::table("tree")
            .with_recursive_expression("tree", Registry::new().select_raw("1", vec![]), &["n"])
            .recursion_limit(50)
            .union_all(Registry::table("other"));
        assert_eq!(
            g.compile_select(&query).unwrap(),
            "(with recursive `tree` (`n`) as (select 1) select /*+ SET_VAR(cte_max_recursion_depth=50) */ * from `tree`) union all (select * from `other`)"
        );
    }

    #[test]
    fn test_json_update_groups_sibling_paths() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users").where_clause("id", "=", 1);
        let values = row(&[
            ("meta->a", Param::from(1)),
            ("name", Param::from("x")),
            ("meta->b->c", Param::from("y")),
        ]);
        assert_eq!(
            g.compile_update(&query, &values).unwrap(),
            "update `users` set `meta` = json_set(ifnull(`meta`, json_object()), '$.\"a\"', cast(? as json), '$.\"b\"', json_merge_patch(ifnull(json_extract(`meta`, '$.\"b\"'), json_object()), cast(? as json))), `name` = ? where `id` = ?"
        );
        assert_eq!(
            g.prepare_bindings_for_update(&query, &values).unwrap(),
            vec![
                Binding::Text(String::from("1")),
                Binding::Text(String::from("{\"c\":\"y\"}")),
                Binding::Text(String::from("x")),
                Binding::Int(1),
            ]
        );
    }

    #[test]
    fn test_json_update_array_paths() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users");
        let values = row(&[("meta->tags[1]", Param::from("b"))]);
        assert_eq!(
            g.compile_update(&query, &values).unwrap(),
            "update `users` set `meta` = json_set(ifnull(`meta`, json_object()), '$.\"tags\"', ifnull(json_extract(`meta`, '$.\"tags\"'), json_array()), '$.\"tags\"[1]', cast(? as json))"
        );
    }

    #[test]
    fn test_update_and_delete_with_order_and_limit() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users")
            .where_clause("id", ">", 1)
            .order_by("id", Direction::Asc)
            .limit(5);
        let values = row(&[("active", Param::from(false))]);
        assert_eq!(
            g.compile_update(&query, &values).unwrap(),
            "update `users` set `active` = ? where `id` > ? order by `id` asc limit 5"
        );
        assert_eq!(
            g.compile_delete(&query).unwrap(),
            "delete from `users` where `id` > ? order by `id` asc limit 5"
        );
    }

    #[test]
    fn test_inserts() {
        let g = MySqlGrammar::default();
        let query = Registry::table("users");
        assert_eq!(
            g.compile_insert(&query, &[]).unwrap(),
            "insert into `users` () values ()"
        );
        let rows = vec![row(&[("email", Param::from("a"))])];
        assert_eq!(
            g.compile_insert_or_ignore(&query, &rows).unwrap(),
            "insert ignore into `users` (`email`) values (?)"
        );
    }

    #[test]
    fn test_upsert_forms() {
        let rows = vec![row(&[("email", Param::from("a")), ("name", Param::from("b"))])];
        let update = vec![UpsertUpdate::Column(String::from("name"))];
        let unique_by = vec![String::from("email")];
        let query = Registry::table("users");

        let g = MySqlGrammar::default();
        assert_eq!(
            g.compile_upsert(&query, &rows, &unique_by, &update).unwrap(),
            "insert into `users` (`email`, `name`) values (?, ?) on duplicate key update `name` = values(`name`)"
        );

        let g = MySqlGrammar::new(GrammarConfig::new().with_upsert_alias(true));
        assert_eq!(
            g.compile_upsert(&query, &rows, &unique_by, &update).unwrap(),
            "insert into `users` (`email`, `name`) values (?, ?) as `laravel_upsert_alias` on duplicate key update `name` = `laravel_upsert_alias`.`name`"
        );
    }
}
