//! Where and having mutators.

use super::{
    Conjunction, DatePart, FulltextOptions, Having, HavingKind, Ident, Registry, Where, WhereKind,
};
use crate::expression::Expression;
use crate::value::{Binding, Param};

/// Operators recorded as bitwise predicates on every engine.
///
/// Engine-specific operators stay basic here and are resolved through
/// [`Grammar::bitwise_operators`](crate::Grammar::bitwise_operators).
pub(crate) const BITWISE_OPERATORS: [&str; 6] = ["&", "|", "^", "<<", ">>", "&~"];

fn is_bitwise(operator: &str) -> bool {
    BITWISE_OPERATORS.contains(&operator)
}

fn params<I, V>(values: I) -> Vec<Param>
where
    I: IntoIterator<Item = V>,
    V: Into<Param>,
{
    values.into_iter().map(Into::into).collect()
}

impl Registry {
    fn push_where(mut self, kind: WhereKind, boolean: Conjunction, not: bool) -> Self {
        self.wheres.push(Where { boolean, not, kind });
        self
    }

    fn push_having(mut self, kind: HavingKind, boolean: Conjunction, not: bool) -> Self {
        self.havings.push(Having { boolean, not, kind });
        self
    }

    fn add_where(
        self,
        column: Ident,
        operator: &str,
        value: Param,
        boolean: Conjunction,
    ) -> Self {
        let operator = operator.to_lowercase();

        if matches!(&value, Param::Value(v) if v.is_null())
            && matches!(operator.as_str(), "=" | "!=" | "<>")
        {
            let not = operator != "=";
            return self.push_where(WhereKind::Null { column }, boolean, not);
        }

        if let (Ident::Name(name), Param::Value(Binding::Bool(flag))) = (&column, &value) {
            if name.contains("->") {
                let kind = WhereKind::JsonBoolean {
                    column: name.clone(),
                    operator,
                    value: *flag,
                };
                return self.push_where(kind, boolean, false);
            }
        }

        let kind = if is_bitwise(&operator) {
            WhereKind::Bitwise {
                column,
                operator,
                value,
            }
        } else {
            WhereKind::Basic {
                column,
                operator,
                value,
            }
        };
        self.push_where(kind, boolean, false)
    }

    // ==================== Basic ====================

    /// Adds `column operator value`.
    ///
    /// A null value compared with `=`, `!=` or `<>` becomes a null check, a
    /// boolean compared against a JSON selector becomes a JSON boolean check
    /// and bitwise operators produce a bitwise predicate.
    #[must_use]
    pub fn where_clause(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.add_where(column.into(), operator, value.into(), Conjunction::And)
    }

    /// Adds `or column operator value`.
    #[must_use]
    pub fn or_where(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.add_where(column.into(), operator, value.into(), Conjunction::Or)
    }

    /// Adds `not (column operator value)`.
    #[must_use]
    pub fn where_not(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        let inner = Self::new().where_clause(column, operator, value);
        self.push_where(
            WhereKind::Nested {
                query: Box::new(inner),
            },
            Conjunction::And,
            true,
        )
    }

    /// Adds a raw predicate with its bindings.
    #[must_use]
    pub fn where_raw(self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        let kind = WhereKind::Raw {
            sql: sql.into(),
            bindings,
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `or` a raw predicate with its bindings.
    #[must_use]
    pub fn or_where_raw(self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        let kind = WhereKind::Raw {
            sql: sql.into(),
            bindings,
        };
        self.push_where(kind, Conjunction::Or, false)
    }

    /// Adds a predicate expression.
    #[must_use]
    pub fn where_expression(self, expression: Expression) -> Self {
        self.push_where(WhereKind::Expression { expression }, Conjunction::And, false)
    }

    // ==================== In ====================

    /// Adds `column in (values)`; no values compiles to `0 = 1`.
    #[must_use]
    pub fn where_in<I, V>(self, column: impl Into<Ident>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Param>,
    {
        let kind = WhereKind::In {
            column: column.into(),
            values: params(values),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `or column in (values)`.
    #[must_use]
    pub fn or_where_in<I, V>(self, column: impl Into<Ident>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Param>,
    {
        let kind = WhereKind::In {
            column: column.into(),
            values: params(values),
        };
        self.push_where(kind, Conjunction::Or, false)
    }

    /// Adds `column not in (values)`; no values compiles to `1 = 1`.
    #[must_use]
    pub fn where_not_in<I, V>(self, column: impl Into<Ident>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Param>,
    {
        let kind = WhereKind::In {
            column: column.into(),
            values: params(values),
        };
        self.push_where(kind, Conjunction::And, true)
    }

    /// Adds `column in (1, 2, ..)` with the integers inlined.
    #[must_use]
    pub fn where_integer_in_raw(self, column: impl Into<Ident>, values: Vec<i64>) -> Self {
        let kind = WhereKind::InRaw {
            column: column.into(),
            values,
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `column not in (1, 2, ..)` with the integers inlined.
    #[must_use]
    pub fn where_integer_not_in_raw(self, column: impl Into<Ident>, values: Vec<i64>) -> Self {
        let kind = WhereKind::InRaw {
            column: column.into(),
            values,
        };
        self.push_where(kind, Conjunction::And, true)
    }

    // ==================== Null ====================

    /// Adds `column is null`.
    #[must_use]
    pub fn where_null(self, column: impl Into<Ident>) -> Self {
        let kind = WhereKind::Null {
            column: column.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `or column is null`.
    #[must_use]
    pub fn or_where_null(self, column: impl Into<Ident>) -> Self {
        let kind = WhereKind::Null {
            column: column.into(),
        };
        self.push_where(kind, Conjunction::Or, false)
    }

    /// Adds `column is not null`.
    #[must_use]
    pub fn where_not_null(self, column: impl Into<Ident>) -> Self {
        let kind = WhereKind::Null {
            column: column.into(),
        };
        self.push_where(kind, Conjunction::And, true)
    }

    // ==================== Between ====================

    /// Adds `column between min and max`.
    #[must_use]
    pub fn where_between(
        self,
        column: impl Into<Ident>,
        min: impl Into<Param>,
        max: impl Into<Param>,
    ) -> Self {
        let kind = WhereKind::Between {
            column: column.into(),
            min: min.into(),
            max: max.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `column not between min and max`.
    #[must_use]
    pub fn where_not_between(
        self,
        column: impl Into<Ident>,
        min: impl Into<Param>,
        max: impl Into<Param>,
    ) -> Self {
        let kind = WhereKind::Between {
            column: column.into(),
            min: min.into(),
            max: max.into(),
        };
        self.push_where(kind, Conjunction::And, true)
    }

    /// Adds `column between min_column and max_column`.
    #[must_use]
    pub fn where_between_columns(
        self,
        column: impl Into<Ident>,
        min: impl Into<Ident>,
        max: impl Into<Ident>,
    ) -> Self {
        let kind = WhereKind::BetweenColumns {
            column: column.into(),
            min: min.into(),
            max: max.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    // ==================== Dates ====================

    fn where_date_part(
        self,
        part: DatePart,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        let kind = WhereKind::Date {
            part,
            column: column.into(),
            operator: operator.to_lowercase(),
            value: value.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Compares the date part of a column.
    #[must_use]
    pub fn where_date(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.where_date_part(DatePart::Date, column, operator, value)
    }

    /// Compares the time part of a column.
    #[must_use]
    pub fn where_time(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.where_date_part(DatePart::Time, column, operator, value)
    }

    /// Compares the day of month of a column.
    #[must_use]
    pub fn where_day(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.where_date_part(DatePart::Day, column, operator, value)
    }

    /// Compares the month of a column.
    #[must_use]
    pub fn where_month(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.where_date_part(DatePart::Month, column, operator, value)
    }

    /// Compares the year of a column.
    #[must_use]
    pub fn where_year(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.where_date_part(DatePart::Year, column, operator, value)
    }

    // ==================== Columns ====================

    /// Compares two columns.
    #[must_use]
    pub fn where_column(
        self,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        let kind = WhereKind::Column {
            first: first.into(),
            operator: operator.to_lowercase(),
            second: second.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Compares two columns, joined with `or`.
    #[must_use]
    pub fn or_where_column(
        self,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        let kind = WhereKind::Column {
            first: first.into(),
            operator: operator.to_lowercase(),
            second: second.into(),
        };
        self.push_where(kind, Conjunction::Or, false)
    }

    /// Join condition comparing two columns.
    #[must_use]
    pub fn on(self, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.where_column(first, operator, second)
    }

    /// Join condition comparing two columns, joined with `or`.
    #[must_use]
    pub fn or_on(self, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.or_where_column(first, operator, second)
    }

    // ==================== Nested and sub-queries ====================

    /// Adds a parenthesized group built by `build`; an empty group adds nothing.
    #[must_use]
    pub fn where_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let query = build(Self::new());
        if query.wheres.is_empty() {
            return self;
        }
        let query = Box::new(query);
        self.push_where(WhereKind::Nested { query }, Conjunction::And, false)
    }

    /// Adds an `or` parenthesized group built by `build`.
    #[must_use]
    pub fn or_where_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let query = build(Self::new());
        if query.wheres.is_empty() {
            return self;
        }
        let query = Box::new(query);
        self.push_where(WhereKind::Nested { query }, Conjunction::Or, false)
    }

    /// Adds a negated parenthesized group built by `build`.
    #[must_use]
    pub fn where_not_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let query = build(Self::new());
        if query.wheres.is_empty() {
            return self;
        }
        let query = Box::new(query);
        self.push_where(WhereKind::Nested { query }, Conjunction::And, true)
    }

    /// Compares a column with a sub-query: `column operator (select ..)`.
    #[must_use]
    pub fn where_sub(self, column: impl Into<Ident>, operator: &str, query: Self) -> Self {
        let kind = WhereKind::Sub {
            column: column.into(),
            operator: operator.to_lowercase(),
            query: Box::new(query),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `exists (select ..)`.
    #[must_use]
    pub fn where_exists(self, query: Self) -> Self {
        let kind = WhereKind::Exists {
            query: Box::new(query),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds `or exists (select ..)`.
    #[must_use]
    pub fn or_where_exists(self, query: Self) -> Self {
        let kind = WhereKind::Exists {
            query: Box::new(query),
        };
        self.push_where(kind, Conjunction::Or, false)
    }

    /// Adds `not exists (select ..)`.
    #[must_use]
    pub fn where_not_exists(self, query: Self) -> Self {
        let kind = WhereKind::Exists {
            query: Box::new(query),
        };
        self.push_where(kind, Conjunction::And, true)
    }

    /// Compares a row of columns with a row of values.
    ///
    /// The column and value counts must match; compilation rejects the
    /// clause otherwise.
    #[must_use]
    pub fn where_row_values<C, V>(self, columns: C, operator: &str, values: V) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Ident>,
        V: IntoIterator,
        V::Item: Into<Param>,
    {
        let kind = WhereKind::RowValues {
            columns: columns.into_iter().map(Into::into).collect(),
            operator: operator.to_lowercase(),
            values: params(values),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    // ==================== JSON ====================

    /// Checks that a JSON column contains `value`.
    #[must_use]
    pub fn where_json_contains(self, column: impl Into<String>, value: serde_json::Value) -> Self {
        let kind = WhereKind::JsonContains {
            column: column.into(),
            value,
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Checks that a JSON column does not contain `value`.
    #[must_use]
    pub fn where_json_doesnt_contain(
        self,
        column: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        let kind = WhereKind::JsonContains {
            column: column.into(),
            value,
        };
        self.push_where(kind, Conjunction::And, true)
    }

    /// Checks that a JSON path exists.
    #[must_use]
    pub fn where_json_contains_key(self, column: impl Into<String>) -> Self {
        let kind = WhereKind::JsonContainsKey {
            column: column.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Checks that a JSON path does not exist.
    #[must_use]
    pub fn where_json_doesnt_contain_key(self, column: impl Into<String>) -> Self {
        let kind = WhereKind::JsonContainsKey {
            column: column.into(),
        };
        self.push_where(kind, Conjunction::And, true)
    }

    /// Compares the length of a JSON array.
    #[must_use]
    pub fn where_json_length(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        let kind = WhereKind::JsonLength {
            column: column.into(),
            operator: operator.to_lowercase(),
            value: value.into(),
        };
        self.push_where(kind, Conjunction::And, false)
    }

    /// Adds a full text search over `columns`.
    #[must_use]
    pub fn where_full_text<I, C>(
        self,
        columns: I,
        value: impl Into<Param>,
        options: FulltextOptions,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        let kind = WhereKind::Fulltext {
            columns: columns.into_iter().map(Into::into).collect(),
            value: value.into(),
            options,
        };
        self.push_where(kind, Conjunction::And, false)
    }

    // ==================== Having ====================

    fn add_having(
        self,
        column: Ident,
        operator: &str,
        value: Param,
        boolean: Conjunction,
    ) -> Self {
        let operator = operator.to_lowercase();
        let kind = if is_bitwise(&operator) {
            HavingKind::Bitwise {
                column,
                operator,
                value,
            }
        } else {
            HavingKind::Basic {
                column,
                operator,
                value,
            }
        };
        self.push_having(kind, boolean, false)
    }

    /// Adds `having column operator value`.
    #[must_use]
    pub fn having(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.add_having(column.into(), operator, value.into(), Conjunction::And)
    }

    /// Adds `or column operator value` to the having list.
    #[must_use]
    pub fn or_having(
        self,
        column: impl Into<Ident>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.add_having(column.into(), operator, value.into(), Conjunction::Or)
    }

    /// Adds a raw having predicate with its bindings.
    #[must_use]
    pub fn having_raw(self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        let kind = HavingKind::Raw {
            sql: sql.into(),
            bindings,
        };
        self.push_having(kind, Conjunction::And, false)
    }

    /// Adds a having predicate expression.
    #[must_use]
    pub fn having_expression(self, expression: Expression) -> Self {
        self.push_having(HavingKind::Expression { expression }, Conjunction::And, false)
    }

    /// Adds `having column between min and max`.
    #[must_use]
    pub fn having_between(
        self,
        column: impl Into<Ident>,
        min: impl Into<Param>,
        max: impl Into<Param>,
    ) -> Self {
        let kind = HavingKind::Between {
            column: column.into(),
            min: min.into(),
            max: max.into(),
        };
        self.push_having(kind, Conjunction::And, false)
    }

    /// Adds `having column is null`.
    #[must_use]
    pub fn having_null(self, column: impl Into<Ident>) -> Self {
        let kind = HavingKind::Null {
            column: column.into(),
        };
        self.push_having(kind, Conjunction::And, false)
    }

    /// Adds `having column is not null`.
    #[must_use]
    pub fn having_not_null(self, column: impl Into<Ident>) -> Self {
        let kind = HavingKind::Null {
            column: column.into(),
        };
        self.push_having(kind, Conjunction::And, true)
    }

    /// Adds a parenthesized having group built by `build`.
    #[must_use]
    pub fn having_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let query = build(Self::new());
        if query.havings.is_empty() {
            return self;
        }
        let query = Box::new(query);
        self.push_having(HavingKind::Nested { query }, Conjunction::And, false)
    }
}
