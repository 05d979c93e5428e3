//! PostgreSQL grammar.

use indexmap::IndexMap;

use super::json::{json_text, JsonNode, JsonSegment};
use super::statement::{
    self, bindings_for_update_values_first, columnize_names, require_unique_by, row_id_select,
    table, with_expressions,
};
use super::wrap::{self, bracket_tokens, split_array_keys};
use super::{Grammar, Row, SelectView};
use crate::config::GrammarConfig;
use crate::error::{GrammarError, Result};
use crate::registry::{
    BindingCategory, Cycle, DatePart, Distinct, FulltextOptions, Ident, Lock, Registry,
    UpsertUpdate,
};
use crate::value::{Binding, Param};

/// Text search configurations accepted by full text wheres.
const FULLTEXT_LANGUAGES: [&str; 22] = [
    "simple",
    "arabic",
    "danish",
    "dutch",
    "english",
    "finnish",
    "french",
    "german",
    "hungarian",
    "indonesian",
    "irish",
    "italian",
    "lithuanian",
    "nepali",
    "norwegian",
    "portuguese",
    "romanian",
    "russian",
    "spanish",
    "swedish",
    "tamil",
    "turkish",
];

/// PostgreSQL grammar.
#[derive(Debug, Clone, Default)]
pub struct PostgresGrammar {
    config: GrammarConfig,
}

/// `'{"a",0}'`: a text array path for `jsonb_set` and `#>`.
fn path_array(segments: &[JsonSegment]) -> String {
    let items: Vec<String> = segments
        .iter()
        .map(|segment| match segment {
            JsonSegment::Key(key) => {
                format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
            }
            JsonSegment::Index(index) => index.to_string(),
        })
        .collect();
    format!("'{{{}}}'", items.join(",").replace('\'', "''"))
}

/// Splits `a->b[0]` into read path attributes: quoted keys, bare indexes.
fn path_attributes(path: &str) -> Vec<String> {
    let mut attributes = Vec::new();
    for segment in path.split("->") {
        let (key, brackets) = split_array_keys(segment);
        if !key.is_empty() {
            attributes.push(key);
        }
        attributes.extend(bracket_tokens(brackets));
    }
    attributes
        .into_iter()
        .map(|attribute| {
            if attribute.parse::<i64>().is_ok() {
                attribute.to_owned()
            } else {
                format!("'{}'", attribute.replace('\'', "''"))
            }
        })
        .collect()
}

impl PostgresGrammar {
    /// Creates a PostgreSQL grammar.
    #[must_use]
    pub const fn new(config: GrammarConfig) -> Self {
        Self { config }
    }

    /// A JSON selector returning `jsonb` rather than text.
    fn wrap_json_document(&self, column: &str) -> Result<String> {
        Ok(self.wrap(column)?.replace("->>", "->"))
    }

    /// Folds the children of `node` into nested `jsonb_set` calls over `base`.
    fn jsonb_set_fold(
        &self,
        field: &str,
        node: &JsonNode,
        base: String,
        path: &mut Vec<JsonSegment>,
        bindings: &mut Vec<Binding>,
    ) -> Result<String> {
        let mut acc = base;
        for (segment, child) in node.children() {
            let relative = path_array(std::slice::from_ref(&segment));
            path.push(segment);
            let value = match child {
                JsonNode::Leaf(Param::Raw(expression)) => expression.value().to_owned(),
                JsonNode::Leaf(Param::Value(binding)) => {
                    bindings.push(json_text(binding));
                    String::from("?::jsonb")
                }
                JsonNode::Object(_) | JsonNode::Array(_) => {
                    let empty = if child.is_array() { "'[]'::jsonb" } else { "'{}'::jsonb" };
                    let base = format!("coalesce({field}::jsonb #> {}, {empty})", path_array(path));
                    self.jsonb_set_fold(field, child, base, path, bindings)?
                }
            };
            path.pop();
            acc = format!("jsonb_set({acc}, {relative}, {value})");
        }
        Ok(acc)
    }

    fn join_where_conditions(&self, query: &Registry) -> Result<String> {
        let mut compiled = Vec::new();
        for join in &query.joins {
            for clause in &join.clause.wheres {
                compiled.push(format!(
                    "{} {}",
                    clause.boolean.as_sql(),
                    self.compile_where(clause)?
                ));
            }
        }
        Ok(compiled.join(" "))
    }
}

impl Grammar for PostgresGrammar {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn wrap_json_selector(&self, value: &str) -> Result<String> {
        let (column, path) = value.split_once("->").unwrap_or((value, ""));
        let field = self.wrap(column)?;
        let mut attributes = path_attributes(path);
        let Some(last) = attributes.pop() else {
            return Ok(field);
        };
        if attributes.is_empty() {
            return Ok(format!("{field}->>{last}"));
        }
        Ok(format!("{field}->{}->>{last}", attributes.join("->")))
    }

    fn wrap_json_boolean_selector(&self, value: &str) -> Result<String> {
        Ok(format!("({})::jsonb", self.wrap_json_document(value)?))
    }

    fn wrap_json_boolean_value(&self, value: &str) -> String {
        format!("'{value}'::jsonb")
    }

    fn compile_columns(&self, view: &SelectView<'_>) -> Result<String> {
        let select = match &view.query().distinct {
            Distinct::On(columns) => {
                format!("select distinct on ({}) ", columnize_names(self, columns)?)
            }
            Distinct::All => String::from("select distinct "),
            Distinct::Off => String::from("select "),
        };
        Ok(format!("{select}{}", self.columnize(view.columns())?))
    }

    fn where_basic(&self, column: &Ident, operator: &str, value: &Param) -> Result<String> {
        if operator.to_lowercase().contains("like") {
            return Ok(format!(
                "{}::text {operator} {}",
                self.wrap_column(column)?,
                self.parameter(value)
            ));
        }
        Ok(format!(
            "{} {} {}",
            self.wrap_column(column)?,
            operator.replace('?', "??"),
            self.parameter(value)
        ))
    }

    fn bitwise_operators(&self) -> &'static [&'static str] {
        &["&", "|", "^", "#", "<<", ">>", "<<=", ">>=", "&~"]
    }

    fn where_bitwise(&self, column: &Ident, operator: &str, value: &Param) -> Result<String> {
        Ok(format!(
            "({} {} {})::bool",
            self.wrap_column(column)?,
            operator.replace('?', "??"),
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
            DatePart::Date => format!("{column}::date {operator} {value}"),
            DatePart::Time => format!("{column}::time {operator} {value}"),
            DatePart::Day | DatePart::Month | DatePart::Year => {
                format!("extract({} from {column}) {operator} {value}", part.as_sql())
            }
        })
    }

    fn compile_json_contains(&self, column: &str, value: &str) -> Result<String> {
        Ok(format!("({})::jsonb @> {value}", self.wrap_json_document(column)?))
    }

    fn compile_json_contains_key(&self, column: &str) -> Result<String> {
        let (head, last) = column.rsplit_once("->").unwrap_or(("", column));
        let mut segments: Vec<&str> = if head.is_empty() {
            vec![]
        } else {
            head.split("->").collect()
        };

        let mut index = None;
        if let Ok(i) = last.parse::<i64>() {
            index = Some(i);
        } else if let Some(body) = last.strip_suffix(']') {
            if let Some(open) = body.rfind('[') {
                if let Ok(i) = body[open + 1..].parse::<i64>() {
                    segments.push(&last[..open]);
                    index = Some(i);
                }
            }
        }

        if let Some(i) = index {
            let document = self.wrap_json_document(&segments.join("->"))?;
            let length = if i < 0 { i.unsigned_abs() } else { i.unsigned_abs() + 1 };
            return Ok(format!(
                "case when jsonb_typeof(({document})::jsonb) = 'array' then jsonb_array_length(({document})::jsonb) >= {length} else false end"
            ));
        }

        if segments.is_empty() {
            return Err(GrammarError::invalid("JSON key checks need a column and a path"));
        }
        let document = self.wrap_json_document(&segments.join("->"))?;
        let key = last.replace('\'', "''");
        Ok(format!("coalesce(({document})::jsonb ?? '{key}', false)"))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> Result<String> {
        Ok(format!(
            "jsonb_array_length(({})::jsonb) {operator} {value}",
            self.wrap_json_document(column)?
        ))
    }

    fn where_full_text(
        &self,
        columns: &[Ident],
        value: &Param,
        options: &FulltextOptions,
    ) -> Result<String> {
        let language = options
            .language
            .as_deref()
            .filter(|language| FULLTEXT_LANGUAGES.contains(language))
            .unwrap_or("english");
        let vectors = columns
            .iter()
            .map(|column| Ok(format!("to_tsvector('{language}', {})", self.wrap_column(column)?)))
            .collect::<Result<Vec<_>>>()?;
        let function = match options.mode.as_deref() {
            Some("phrase") => "phraseto_tsquery",
            Some("websearch") => "websearch_to_tsquery",
            _ => "plainto_tsquery",
        };
        Ok(format!(
            "({}) @@ {function}('{language}', {})",
            vectors.join(" || "),
            self.parameter(value)
        ))
    }

    fn compile_lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::Update => String::from("for update"),
            Lock::Shared => String::from("for share"),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    fn compile_materialized(&self, materialized: Option<bool>) -> &'static str {
        match materialized {
            Some(true) => "materialized ",
            Some(false) => "not materialized ",
            None => "",
        }
    }

    fn compile_cycle(&self, cycle: &Cycle) -> Result<String> {
        Ok(format!(
            " cycle {} set {} using {}",
            columnize_names(self, &cycle.columns)?,
            self.wrap(&cycle.mark_column)?,
            self.wrap(&cycle.path_column)?
        ))
    }

    fn compile_insert_or_ignore(&self, query: &Registry, rows: &[Row]) -> Result<String> {
        Ok(format!("{} on conflict do nothing", self.compile_insert(query, rows)?))
    }

    fn compile_insert_or_ignore_using(
        &self,
        query: &Registry,
        columns: &[String],
        sql: &str,
    ) -> Result<String> {
        Ok(format!(
            "{} on conflict do nothing",
            self.compile_insert_using(query, columns, sql)?
        ))
    }

    fn compile_insert_get_id(
        &self,
        query: &Registry,
        row: &Row,
        sequence: Option<&str>,
    ) -> Result<String> {
        Ok(format!(
            "{} returning {}",
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
        let empty = if tree.is_array() { "'[]'::jsonb" } else { "'{}'::jsonb" };
        let base = format!("coalesce({field}::jsonb, {empty})");
        let mut bindings = Vec::new();
        let sql = self.jsonb_set_fold(&field, tree, base, &mut vec![], &mut bindings)?;
        Ok((format!("{field} = {sql}"), bindings))
    }

    fn compile_update(&self, query: &Registry, values: &Row) -> Result<String> {
        if query.joins.is_empty() && query.limit.is_none() {
            return statement::compile_update(self, query, values);
        }
        let table = table(self, query)?;
        let (columns, _) = self.compile_update_columns(query, values)?;
        let sql = format!(
            "update {table} set {columns} where {} in ({})",
            self.wrap("ctid")?,
            row_id_select(self, query, "ctid")?
        );
        with_expressions(self, query, &sql)
    }

    fn prepare_bindings_for_update(&self, query: &Registry, values: &Row) -> Result<Vec<Binding>> {
        bindings_for_update_values_first(self, query, values)
    }

    fn compile_update_from(&self, query: &Registry, values: &Row) -> Result<String> {
        let table = table(self, query)?;
        let (columns, _) = self.compile_update_columns(query, values)?;

        let froms = query
            .joins
            .iter()
            .map(|join| self.wrap_table_ident(&join.table))
            .collect::<Result<Vec<_>>>()?;
        let from = if froms.is_empty() {
            String::new()
        } else {
            format!(" from {}", froms.join(", "))
        };

        let base_wheres = self.compile_wheres(query)?;
        let join_wheres = self.join_where_conditions(query)?;
        let wheres = match (base_wheres.is_empty(), join_wheres.is_empty()) {
            (_, true) => base_wheres,
            (true, false) => format!("where {}", wrap::remove_leading_boolean(&join_wheres)),
            (false, false) => format!("{base_wheres} {join_wheres}"),
        };

        with_expressions(self, query, &format!("update {table} set {columns}{from} {wheres}"))
    }

    fn prepare_bindings_for_update_from(
        &self,
        query: &Registry,
        values: &Row,
    ) -> Result<Vec<Binding>> {
        let bindings = query.bindings_by_category();
        let (_, value_bindings) = self.compile_update_columns(query, values)?;

        let mut out = bindings.flatten_only(&[
            BindingCategory::UnionExpressions,
            BindingCategory::Expressions,
            BindingCategory::From,
        ]);
        out.extend(value_bindings);
        out.extend(query.joins.iter().flat_map(|join| join.table.bindings()));
        out.extend(bindings.get(BindingCategory::Where).iter().cloned());
        for join in &query.joins {
            out.extend(join.clause.wheres.iter().flat_map(|clause| clause.bindings()));
        }
        Ok(out)
    }

    fn compile_delete(&self, query: &Registry) -> Result<String> {
        if query.joins.is_empty() && query.limit.is_none() {
            return statement::compile_delete(self, query);
        }
        let table = table(self, query)?;
        let sql = format!(
            "delete from {table} where {} in ({})",
            self.wrap("ctid")?,
            row_id_select(self, query, "ctid")?
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
        let mut sql = self.compile_insert(query, rows)?;
        sql.push_str(&format!(
            " on conflict ({}) do update set ",
            columnize_names(self, unique_by)?
        ));
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
        sql.push_str(&assignments.join(", "));
        Ok(sql)
    }

    fn compile_truncate(&self, query: &Registry) -> Result<IndexMap<String, Vec<Binding>>> {
        let table = table(self, query)?;
        Ok(IndexMap::from([(
            format!("truncate {table} restart identity cascade"),
            vec![],
        )]))
    }
}
