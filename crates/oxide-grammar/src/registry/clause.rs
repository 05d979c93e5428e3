//! Clause types stored by a [`Registry`].

use serde::{Deserialize, Serialize};

use super::Registry;
use crate::expression::Expression;
use crate::value::{Binding, Param};

/// A column or table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "IdentRepr", into = "IdentRepr")]
pub enum Ident {
    /// A plain, possibly dotted or aliased name such as `users.id as uid`.
    Name(String),
    /// Raw SQL with the bindings its placeholders consume.
    Raw {
        expression: Expression,
        bindings: Vec<Binding>,
    },
    /// A sub-query aliased as a column or table.
    Sub {
        query: Box<Registry>,
        alias: String,
    },
}

impl Ident {
    /// Creates a raw reference with bindings.
    #[must_use]
    pub fn raw(sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self::Raw {
            expression: Expression::new(sql),
            bindings,
        }
    }

    /// Creates an aliased sub-query reference.
    #[must_use]
    pub fn sub(query: Registry, alias: impl Into<String>) -> Self {
        Self::Sub {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    /// Returns the plain name, if any.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Self::Name(String::from(name))
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for Ident {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<Expression> for Ident {
    fn from(expression: Expression) -> Self {
        Self::Raw {
            expression,
            bindings: vec![],
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IdentRepr {
    Name(String),
    Raw {
        raw: Expression,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
    Sub {
        sub: Box<Registry>,
        alias: String,
    },
}

impl From<IdentRepr> for Ident {
    fn from(repr: IdentRepr) -> Self {
        match repr {
            IdentRepr::Name(name) => Self::Name(name),
            IdentRepr::Raw { raw, bindings } => Self::Raw {
                expression: raw,
                bindings,
            },
            IdentRepr::Sub { sub, alias } => Self::Sub { query: sub, alias },
        }
    }
}

impl From<Ident> for IdentRepr {
    fn from(ident: Ident) -> Self {
        match ident {
            Ident::Name(name) => Self::Name(name),
            Ident::Raw {
                expression,
                bindings,
            } => Self::Raw {
                raw: expression,
                bindings,
            },
            Ident::Sub { query, alias } => Self::Sub { sub: query, alias },
        }
    }
}

/// Conjunction joining a clause to the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// The date component compared by a date-based where clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

impl DatePart {
    /// Returns the SQL function name used by the generic grammar.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Options for full text searches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulltextOptions {
    /// Search mode (`boolean` for MySQL; `phrase` or `websearch` for Postgres).
    pub mode: Option<String>,
    /// MySQL query expansion.
    pub expanded: bool,
    /// Postgres text search configuration.
    pub language: Option<String>,
}

/// A where clause: a predicate plus its conjunction and negation flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    #[serde(default)]
    pub boolean: Conjunction,
    #[serde(default)]
    pub not: bool,
    #[serde(flatten)]
    pub kind: WhereKind,
}

impl Where {
    /// Creates an `and` clause.
    #[must_use]
    pub const fn new(kind: WhereKind) -> Self {
        Self {
            boolean: Conjunction::And,
            not: false,
            kind,
        }
    }
}

/// The closed set of where predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WhereKind {
    Basic {
        column: Ident,
        operator: String,
        value: Param,
    },
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
    Expression {
        expression: Expression,
    },
    Bitwise {
        column: Ident,
        operator: String,
        value: Param,
    },
    In {
        column: Ident,
        values: Vec<Param>,
    },
    InRaw {
        column: Ident,
        values: Vec<i64>,
    },
    Null {
        column: Ident,
    },
    Between {
        column: Ident,
        min: Param,
        max: Param,
    },
    BetweenColumns {
        column: Ident,
        min: Ident,
        max: Ident,
    },
    Date {
        part: DatePart,
        column: Ident,
        operator: String,
        value: Param,
    },
    Column {
        first: Ident,
        operator: String,
        second: Ident,
    },
    Nested {
        query: Box<Registry>,
    },
    Sub {
        column: Ident,
        operator: String,
        query: Box<Registry>,
    },
    Exists {
        query: Box<Registry>,
    },
    RowValues {
        columns: Vec<Ident>,
        operator: String,
        values: Vec<Param>,
    },
    JsonBoolean {
        column: String,
        operator: String,
        value: bool,
    },
    JsonContains {
        column: String,
        value: serde_json::Value,
    },
    JsonContainsKey {
        column: String,
    },
    JsonLength {
        column: String,
        operator: String,
        value: Param,
    },
    Fulltext {
        columns: Vec<Ident>,
        value: Param,
        #[serde(default)]
        options: FulltextOptions,
    },
}

/// A having clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Having {
    #[serde(default)]
    pub boolean: Conjunction,
    #[serde(default)]
    pub not: bool,
    #[serde(flatten)]
    pub kind: HavingKind,
}

impl Having {
    /// Creates an `and` clause.
    #[must_use]
    pub const fn new(kind: HavingKind) -> Self {
        Self {
            boolean: Conjunction::And,
            not: false,
            kind,
        }
    }
}

/// The closed set of having predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HavingKind {
    Basic {
        column: Ident,
        operator: String,
        value: Param,
    },
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
    Expression {
        expression: Expression,
    },
    Between {
        column: Ident,
        min: Param,
        max: Param,
    },
    Null {
        column: Ident,
    },
    Nested {
        query: Box<Registry>,
    },
    Bitwise {
        column: Ident,
        operator: String,
        value: Param,
    },
}

/// Join type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
            Self::Cross => "cross",
        }
    }
}

/// A join: its table plus a registry carrying the `on` clauses and nested joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    #[serde(default)]
    pub kind: JoinType,
    pub table: Ident,
    #[serde(default)]
    pub clause: Box<Registry>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// An order by entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Order {
    Column {
        column: Ident,
        #[serde(default)]
        direction: Direction,
    },
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
    Random {
        #[serde(default)]
        seed: Option<String>,
    },
}

/// A query combined with `union` / `union all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub query: Box<Registry>,
    #[serde(default)]
    pub all: bool,
}

/// The body of a common table expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CteQuery {
    Query(Box<Registry>),
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
}

/// Cycle detection for recursive expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub columns: Vec<String>,
    pub mark_column: String,
    pub path_column: String,
}

/// A common table expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub materialized: Option<bool>,
    pub query: CteQuery,
    #[serde(default)]
    pub cycle: Option<Cycle>,
}

impl Cte {
    /// Creates a non-recursive expression over a query.
    #[must_use]
    pub fn new(name: impl Into<String>, query: Registry) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            recursive: false,
            materialized: None,
            query: CteQuery::Query(Box::new(query)),
            cycle: None,
        }
    }

    /// Creates a non-recursive expression over raw SQL.
    #[must_use]
    pub fn raw(name: impl Into<String>, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            recursive: false,
            materialized: None,
            query: CteQuery::Raw {
                sql: sql.into(),
                bindings,
            },
            cycle: None,
        }
    }

    /// Sets the column list.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| String::from(*c)).collect();
        self
    }

    /// Marks the expression recursive.
    #[must_use]
    pub const fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Sets the materialization hint.
    #[must_use]
    pub const fn materialized(mut self, materialized: bool) -> Self {
        self.materialized = Some(materialized);
        self
    }

    /// Adds cycle detection.
    #[must_use]
    pub fn cycle(mut self, columns: &[&str], mark_column: &str, path_column: &str) -> Self {
        self.cycle = Some(Cycle {
            columns: columns.iter().map(|c| String::from(*c)).collect(),
            mark_column: String::from(mark_column),
            path_column: String::from(path_column),
        });
        self
    }
}

/// An aggregate replacing the column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<Ident>,
}

/// Distinct selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distinct {
    #[default]
    Off,
    All,
    /// Postgres `distinct on (..)`; other grammars emit a plain `distinct`.
    On(Vec<String>),
}

impl Distinct {
    /// Returns true unless distinct is off.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Row locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lock {
    /// Exclusive lock (`for update`).
    Update,
    /// Shared lock.
    Shared,
    /// Dialect-specific lock text emitted verbatim.
    Raw(String),
}

/// Index hint kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexHintKind {
    Hint,
    Force,
    Ignore,
}

/// An index hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHint {
    pub kind: IndexHintKind,
    pub index: String,
}

/// The update assignment of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpsertUpdate {
    /// Take the incoming row's value for the column.
    Column(String),
    /// Assign a value.
    Value(String, Param),
}
