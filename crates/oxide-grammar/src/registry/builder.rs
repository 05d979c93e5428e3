//! Select, source, join, ordering and paging mutators.

use super::{
    Aggregate, Cte, Direction, Distinct, Ident, IndexHint, IndexHintKind, Join, JoinType, Lock,
    Order, Registry, Union,
};
use crate::value::Binding;

impl Registry {
    // ==================== Columns ====================

    /// Replaces the column list.
    #[must_use]
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Appends columns to the column list.
    #[must_use]
    pub fn add_select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.columns
            .get_or_insert_with(Vec::new)
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Appends a raw column with its bindings.
    #[must_use]
    pub fn select_raw(mut self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        self.columns
            .get_or_insert_with(Vec::new)
            .push(Ident::raw(sql, bindings));
        self
    }

    /// Appends a sub-query column: `(select ..) as "alias"`.
    #[must_use]
    pub fn select_sub(mut self, query: Self, alias: impl Into<String>) -> Self {
        self.columns
            .get_or_insert_with(Vec::new)
            .push(Ident::sub(query, alias));
        self
    }

    /// Selects distinct rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = Distinct::All;
        self
    }

    /// Selects the first row of each group of `columns` (Postgres `distinct on`).
    #[must_use]
    pub fn distinct_on<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.distinct = Distinct::On(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the column list with an aggregate function call.
    #[must_use]
    pub fn aggregate<I, C>(mut self, function: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.aggregate = Some(Aggregate {
            function: function.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    // ==================== Sources ====================

    /// Sets the table to select from.
    #[must_use]
    pub fn from(mut self, table: impl Into<Ident>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Selects from an aliased sub-query.
    #[must_use]
    pub fn from_sub(mut self, query: Self, alias: impl Into<String>) -> Self {
        self.from = Some(Ident::sub(query, alias));
        self
    }

    /// Selects from raw SQL.
    #[must_use]
    pub fn from_raw(mut self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        self.from = Some(Ident::raw(sql, bindings));
        self
    }

    fn index_hint(mut self, kind: IndexHintKind, index: impl Into<String>) -> Self {
        self.index_hint = Some(IndexHint {
            kind,
            index: index.into(),
        });
        self
    }

    /// Suggests an index.
    #[must_use]
    pub fn use_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Hint, index)
    }

    /// Forces an index.
    #[must_use]
    pub fn force_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Force, index)
    }

    /// Excludes an index.
    #[must_use]
    pub fn ignore_index(self, index: impl Into<String>) -> Self {
        self.index_hint(IndexHintKind::Ignore, index)
    }

    // ==================== Joins ====================

    /// Adds an inner join on a column comparison.
    #[must_use]
    pub fn join(
        self,
        table: impl Into<Ident>,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        self.join_with(JoinType::Inner, table, |join| join.on(first, operator, second))
    }

    /// Adds a left join on a column comparison.
    #[must_use]
    pub fn left_join(
        self,
        table: impl Into<Ident>,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        self.join_with(JoinType::Left, table, |join| join.on(first, operator, second))
    }

    /// Adds a right join on a column comparison.
    #[must_use]
    pub fn right_join(
        self,
        table: impl Into<Ident>,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        self.join_with(JoinType::Right, table, |join| join.on(first, operator, second))
    }

    /// Adds a cross join.
    #[must_use]
    pub fn cross_join(mut self, table: impl Into<Ident>) -> Self {
        self.joins.push(Join {
            kind: JoinType::Cross,
            table: table.into(),
            clause: Box::default(),
        });
        self
    }

    /// Adds a join whose `on` clauses and nested joins are built by `build`.
    ///
    /// The closure receives an empty registry; `on`, `or_on` and every
    /// `where_*` method add conditions, `join*` methods add nested joins.
    #[must_use]
    pub fn join_with<F>(mut self, kind: JoinType, table: impl Into<Ident>, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.joins.push(Join {
            kind,
            table: table.into(),
            clause: Box::new(build(Self::new())),
        });
        self
    }

    /// Adds an inner join against an aliased sub-query.
    #[must_use]
    pub fn join_sub(
        self,
        query: Self,
        alias: impl Into<String>,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        self.join_with(JoinType::Inner, Ident::sub(query, alias), |join| {
            join.on(first, operator, second)
        })
    }

    /// Adds a left join against an aliased sub-query.
    #[must_use]
    pub fn left_join_sub(
        self,
        query: Self,
        alias: impl Into<String>,
        first: impl Into<Ident>,
        operator: &str,
        second: impl Into<Ident>,
    ) -> Self {
        self.join_with(JoinType::Left, Ident::sub(query, alias), |join| {
            join.on(first, operator, second)
        })
    }

    // ==================== Grouping ====================

    /// Appends group by columns.
    #[must_use]
    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Appends a raw group by expression.
    #[must_use]
    pub fn group_by_raw(mut self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        self.groups.push(Ident::raw(sql, bindings));
        self
    }

    // ==================== Ordering ====================

    fn push_order(mut self, order: Order) -> Self {
        if self.has_unions() {
            self.union_orders.push(order);
        } else {
            self.orders.push(order);
        }
        self
    }

    /// Orders by a column.
    #[must_use]
    pub fn order_by(self, column: impl Into<Ident>, direction: Direction) -> Self {
        self.push_order(Order::Column {
            column: column.into(),
            direction,
        })
    }

    /// Orders by a column, descending.
    #[must_use]
    pub fn order_by_desc(self, column: impl Into<Ident>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Orders by raw SQL.
    #[must_use]
    pub fn order_by_raw(self, sql: impl Into<String>, bindings: Vec<Binding>) -> Self {
        self.push_order(Order::Raw {
            sql: sql.into(),
            bindings,
        })
    }

    /// Orders randomly, optionally seeded (MySQL only uses the seed).
    #[must_use]
    pub fn in_random_order(self, seed: Option<&str>) -> Self {
        self.push_order(Order::Random {
            seed: seed.map(String::from),
        })
    }

    /// Drops every order, including union orders.
    #[must_use]
    pub fn reorder(mut self) -> Self {
        self.orders.clear();
        self.union_orders.clear();
        self
    }

    // ==================== Paging ====================

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        if self.has_unions() {
            self.union_limit = Some(limit);
        } else {
            self.limit = Some(limit);
        }
        self
    }

    /// Sets the row offset.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        if self.has_unions() {
            self.union_offset = Some(offset);
        } else {
            self.offset = Some(offset);
        }
        self
    }

    /// Sets limit and offset for a 1-based page number.
    #[must_use]
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.offset(page.saturating_sub(1) * per_page).limit(per_page)
    }

    // ==================== Unions ====================

    /// Appends a `union` member.
    #[must_use]
    pub fn union(mut self, query: Self) -> Self {
        self.unions.push(Union {
            query: Box::new(query),
            all: false,
        });
        self
    }

    /// Appends a `union all` member.
    #[must_use]
    pub fn union_all(mut self, query: Self) -> Self {
        self.unions.push(Union {
            query: Box::new(query),
            all: true,
        });
        self
    }

    // ==================== Common table expressions ====================

    /// Adds a common table expression.
    #[must_use]
    pub fn with_cte(mut self, cte: Cte) -> Self {
        if self.has_unions() {
            self.union_expressions.push(cte);
        } else {
            self.expressions.push(cte);
        }
        self
    }

    /// Adds a common table expression over a query.
    #[must_use]
    pub fn with_expression(self, name: impl Into<String>, query: Self) -> Self {
        self.with_cte(Cte::new(name, query))
    }

    /// Adds a recursive common table expression with a column list.
    #[must_use]
    pub fn with_recursive_expression(
        self,
        name: impl Into<String>,
        query: Self,
        columns: &[&str],
    ) -> Self {
        self.with_cte(Cte::new(name, query).columns(columns).recursive())
    }

    /// Caps the recursion depth of recursive expressions.
    #[must_use]
    pub fn recursion_limit(mut self, limit: u64) -> Self {
        if self.has_unions() {
            self.union_recursion_limit = Some(limit);
        } else {
            self.recursion_limit = Some(limit);
        }
        self
    }

    // ==================== Locking ====================

    /// Sets a lock.
    #[must_use]
    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Locks selected rows for update.
    #[must_use]
    pub fn lock_for_update(self) -> Self {
        self.lock(Lock::Update)
    }

    /// Locks selected rows in shared mode.
    #[must_use]
    pub fn shared_lock(self) -> Self {
        self.lock(Lock::Shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WhereKind;

    #[test]
    fn test_add_select_initializes_columns() {
        let query = Registry::table("users").add_select(["id"]).add_select(["name"]);
        assert_eq!(
            query.columns,
            Some(vec![Ident::from("id"), Ident::from("name")])
        );
        assert_eq!(Registry::table("users").columns, None);
    }

    #[test]
    fn test_order_limit_and_offset_target_unions() {
        let query = Registry::table("a")
            .order_by("id", Direction::Asc)
            .limit(3)
            .union(Registry::table("b"))
            .order_by_desc("id")
            .limit(10)
            .offset(5);
        assert_eq!(query.orders.len(), 1);
        assert_eq!(query.union_orders.len(), 1);
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.union_limit, Some(10));
        assert_eq!(query.union_offset, Some(5));
        assert_eq!(query.offset, None);
    }

    #[test]
    fn test_expressions_after_union_target_union_level() {
        let query = Registry::table("a")
            .with_expression("x", Registry::table("b"))
            .recursion_limit(5)
            .union_all(Registry::table("c"))
            .with_expression("y", Registry::table("d"))
            .recursion_limit(9);
        assert_eq!(query.expressions.len(), 1);
        assert_eq!(query.union_expressions.len(), 1);
        assert_eq!(query.recursion_limit, Some(5));
        assert_eq!(query.union_recursion_limit, Some(9));
    }

    #[test]
    fn test_join_records_on_clause() {
        let query = Registry::table("users").join("contacts", "users.id", "=", "contacts.user_id");
        assert_eq!(query.joins.len(), 1);
        assert_eq!(query.joins[0].kind, JoinType::Inner);
        assert!(matches!(
            query.joins[0].clause.wheres[0].kind,
            WhereKind::Column { .. }
        ));
    }

    #[test]
    fn test_for_page() {
        let query = Registry::table("users").for_page(3, 15);
        assert_eq!(query.offset, Some(30));
        assert_eq!(query.limit, Some(15));
    }

    #[test]
    fn test_reorder_clears_orders() {
        let query = Registry::table("users")
            .order_by("a", Direction::Asc)
            .in_random_order(None)
            .reorder();
        assert!(query.orders.is_empty());
    }
}
