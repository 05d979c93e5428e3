//! The clause registry: one logical query's full clause set.
//!
//! A [`Registry`] is plain data. It is mutated through the consuming builder
//! methods in this module and compiled by a [`Grammar`](crate::Grammar).
//! Bindings are never stored separately from the clauses that own them;
//! [`Registry::bindings_by_category`] derives them in emission order, so
//! placeholder and binding lists cannot drift apart.

mod builder;
pub mod clause;
mod compile;
mod wheres;

use serde::{Deserialize, Serialize};

pub use clause::{
    Aggregate, Conjunction, Cte, CteQuery, Cycle, DatePart, Direction, Distinct, FulltextOptions,
    Having, HavingKind, Ident, IndexHint, IndexHintKind, Join, JoinType, Lock, Order, Union,
    UpsertUpdate, Where, WhereKind,
};
pub use compile::Compiled;

use crate::value::{Binding, Param};

/// One logical query's clauses.
///
/// Every nested query (joins, sub-selects, unions, common table expressions)
/// owns its own registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub aggregate: Option<Aggregate>,
    /// `None` compiles as `*`.
    pub columns: Option<Vec<Ident>>,
    pub distinct: Distinct,
    pub from: Option<Ident>,
    pub index_hint: Option<IndexHint>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Where>,
    pub groups: Vec<Ident>,
    pub havings: Vec<Having>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<Union>,
    pub union_orders: Vec<Order>,
    pub union_limit: Option<u64>,
    pub union_offset: Option<u64>,
    pub lock: Option<Lock>,
    pub expressions: Vec<Cte>,
    pub union_expressions: Vec<Cte>,
    pub recursion_limit: Option<u64>,
    pub union_recursion_limit: Option<u64>,
}

/// The binding categories, in flattening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingCategory {
    UnionExpressions,
    Expressions,
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl BindingCategory {
    /// Every category in flattening order.
    pub const ALL: [Self; 11] = [
        Self::UnionExpressions,
        Self::Expressions,
        Self::Select,
        Self::From,
        Self::Join,
        Self::Where,
        Self::GroupBy,
        Self::Having,
        Self::Order,
        Self::Union,
        Self::UnionOrder,
    ];
}

/// Per-category binding lists of a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    lists: [Vec<Binding>; 11],
}

impl Bindings {
    const fn index(category: BindingCategory) -> usize {
        category as usize
    }

    /// Returns the bindings of one category.
    #[must_use]
    pub fn get(&self, category: BindingCategory) -> &[Binding] {
        &self.lists[Self::index(category)]
    }

    /// Appends bindings to a category.
    pub fn extend(
        &mut self,
        category: BindingCategory,
        bindings: impl IntoIterator<Item = Binding>,
    ) {
        self.lists[Self::index(category)].extend(bindings);
    }

    /// Flattens every category in order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Binding> {
        self.flatten_except(&[])
    }

    /// Flattens every category in order, skipping `excluded`.
    #[must_use]
    pub fn flatten_except(&self, excluded: &[BindingCategory]) -> Vec<Binding> {
        BindingCategory::ALL
            .iter()
            .filter(|category| !excluded.contains(category))
            .flat_map(|category| self.get(*category).iter().cloned())
            .collect()
    }

    /// Flattens only the given categories, in the given order.
    #[must_use]
    pub fn flatten_only(&self, categories: &[BindingCategory]) -> Vec<Binding> {
        categories
            .iter()
            .flat_map(|category| self.get(*category).iter().cloned())
            .collect()
    }

    /// Total number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Returns true when no category holds a binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }
}

fn param_bindings<'a>(params: impl IntoIterator<Item = &'a Param>) -> Vec<Binding> {
    params.into_iter().filter_map(Param::binding).cloned().collect()
}

impl Ident {
    /// Bindings consumed by this reference.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        match self {
            Self::Name(_) => vec![],
            Self::Raw { bindings, .. } => bindings.clone(),
            Self::Sub { query, .. } => query.bindings(),
        }
    }
}

impl Where {
    /// Bindings consumed by this clause, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        match &self.kind {
            WhereKind::Basic { column, value, .. }
            | WhereKind::Bitwise { column, value, .. }
            | WhereKind::Date { column, value, .. } => {
                let mut out = column.bindings();
                out.extend(param_bindings([value]));
                out
            }
            WhereKind::Raw { bindings, .. } => bindings.clone(),
            WhereKind::Expression { .. }
            | WhereKind::JsonBoolean { .. }
            | WhereKind::JsonContainsKey { .. } => vec![],
            WhereKind::In { column, values } => {
                let mut out = column.bindings();
                out.extend(param_bindings(values));
                out
            }
            WhereKind::InRaw { column, .. } | WhereKind::Null { column } => column.bindings(),
            WhereKind::Between { column, min, max } => {
                let mut out = column.bindings();
                out.extend(param_bindings([min, max]));
                out
            }
            WhereKind::BetweenColumns { column, min, max } => {
                let mut out = column.bindings();
                out.extend(min.bindings());
                out.extend(max.bindings());
                out
            }
            WhereKind::Column { first, second, .. } => {
                let mut out = first.bindings();
                out.extend(second.bindings());
                out
            }
            WhereKind::Nested { query } => query
                .bindings_by_category()
                .get(BindingCategory::Where)
                .to_vec(),
            WhereKind::Sub { column, query, .. } => {
                let mut out = column.bindings();
                out.extend(query.bindings());
                out
            }
            WhereKind::Exists { query } => query.bindings(),
            WhereKind::RowValues { columns, values, .. } => {
                let mut out: Vec<Binding> = columns.iter().flat_map(Ident::bindings).collect();
                out.extend(param_bindings(values));
                out
            }
            WhereKind::JsonContains { value, .. } => vec![Binding::Text(value.to_string())],
            WhereKind::JsonLength { value, .. } => param_bindings([value]),
            WhereKind::Fulltext { columns, value, .. } => {
                let mut out: Vec<Binding> = columns.iter().flat_map(Ident::bindings).collect();
                out.extend(param_bindings([value]));
                out
            }
        }
    }
}

impl Having {
    /// Bindings consumed by this clause, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        match &self.kind {
            HavingKind::Basic { column, value, .. } | HavingKind::Bitwise { column, value, .. } => {
                let mut out = column.bindings();
                out.extend(param_bindings([value]));
                out
            }
            HavingKind::Raw { bindings, .. } => bindings.clone(),
            HavingKind::Expression { .. } => vec![],
            HavingKind::Between { column, min, max } => {
                let mut out = column.bindings();
                out.extend(param_bindings([min, max]));
                out
            }
            HavingKind::Null { column } => column.bindings(),
            HavingKind::Nested { query } => {
                query.bindings_by_category().get(BindingCategory::Having).to_vec()
            }
        }
    }
}

impl Join {
    /// Bindings consumed by this join: the table, nested joins, then `on` clauses.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        let mut out = self.table.bindings();
        out.extend(self.clause.bindings());
        out
    }
}

impl Order {
    /// Bindings consumed by this entry.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        match self {
            Self::Column { column, .. } => column.bindings(),
            Self::Raw { bindings, .. } => bindings.clone(),
            Self::Random { .. } => vec![],
        }
    }
}

impl Cte {
    /// Bindings consumed by the expression body.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        match &self.query {
            CteQuery::Query(query) => query.bindings(),
            CteQuery::Raw { bindings, .. } => bindings.clone(),
        }
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry selecting from a table.
    #[must_use]
    pub fn table(table: impl Into<Ident>) -> Self {
        Self {
            from: Some(table.into()),
            ..Self::default()
        }
    }

    /// Derives the per-category bindings from the stored clauses.
    #[must_use]
    pub fn bindings_by_category(&self) -> Bindings {
        let mut bindings = Bindings::default();

        bindings.extend(
            BindingCategory::UnionExpressions,
            self.union_expressions.iter().flat_map(Cte::bindings),
        );
        bindings.extend(
            BindingCategory::Expressions,
            self.expressions.iter().flat_map(Cte::bindings),
        );
        if let Some(aggregate) = &self.aggregate {
            // distinct-on names replace the aggregate columns
            if !matches!(self.distinct, Distinct::On(_)) {
                bindings.extend(
                    BindingCategory::Select,
                    aggregate.columns.iter().flat_map(Ident::bindings),
                );
            }
        }
        // the union aggregate form emits the column list inside its sub-select
        if self.aggregate.is_none() || self.uses_union_aggregate() {
            if let Some(columns) = &self.columns {
                bindings.extend(BindingCategory::Select, columns.iter().flat_map(Ident::bindings));
            }
        }
        if let Some(from) = &self.from {
            bindings.extend(BindingCategory::From, from.bindings());
        }
        bindings.extend(BindingCategory::Join, self.joins.iter().flat_map(Join::bindings));
        bindings.extend(BindingCategory::Where, self.wheres.iter().flat_map(Where::bindings));
        bindings.extend(BindingCategory::GroupBy, self.groups.iter().flat_map(Ident::bindings));
        bindings.extend(BindingCategory::Having, self.havings.iter().flat_map(Having::bindings));
        bindings.extend(BindingCategory::Order, self.orders.iter().flat_map(Order::bindings));
        bindings.extend(
            BindingCategory::Union,
            self.unions.iter().flat_map(|union| union.query.bindings()),
        );
        bindings.extend(
            BindingCategory::UnionOrder,
            self.union_orders.iter().flat_map(Order::bindings),
        );

        bindings
    }

    /// Returns every binding in emission order.
    #[must_use]
    pub fn bindings(&self) -> Vec<Binding> {
        self.bindings_by_category().flatten()
    }

    /// Returns true when any union was added.
    #[must_use]
    pub fn has_unions(&self) -> bool {
        !self.unions.is_empty()
    }

    /// Returns true when the aggregate must wrap the whole select as a sub-query.
    #[must_use]
    pub fn uses_union_aggregate(&self) -> bool {
        self.aggregate.is_some() && (self.has_unions() || !self.havings.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::raw;

    #[test]
    fn test_bindings_follow_category_order() {
        let query = Registry::table("users")
            .with_expression("recent", Registry::table("posts").where_clause("id", ">", 9))
            .select_raw("? as flag", vec![Binding::Int(1)])
            .join_with(JoinType::Inner, "contacts", |join| {
                join.on("users.id", "=", "contacts.user_id")
                    .where_clause("contacts.kind", "=", "email")
            })
            .where_clause("name", "=", "taylor")
            .group_by_raw("round(score, ?)", vec![Binding::Int(2)])
            .having("total", ">", 3)
            .order_by_raw("field(id, ?)", vec![Binding::Int(4)])
            .union(Registry::table("admins").where_clause("level", "=", 5));

        let names: Vec<Binding> = query.bindings();
        assert_eq!(
            names,
            vec![
                Binding::Int(9),
                Binding::Int(1),
                Binding::Text(String::from("email")),
                Binding::Text(String::from("taylor")),
                Binding::Int(2),
                Binding::Int(3),
                Binding::Int(4),
                Binding::Int(5),
            ]
        );
    }

    #[test]
    fn test_expressions_are_never_bound() {
        let query = Registry::table("users")
            .where_clause("created_at", "<", raw("now()"))
            .where_in("id", vec![Param::from(1), Param::from(raw("2"))]);
        assert_eq!(query.bindings(), vec![Binding::Int(1)]);
    }

    #[test]
    fn test_nested_where_contributes_only_where_bindings() {
        let query = Registry::table("users").where_nested(|q| {
            q.where_clause("a", "=", 1).or_where("b", "=", 2)
        });
        let bindings = query.bindings_by_category();
        assert_eq!(bindings.get(BindingCategory::Where), &[Binding::Int(1), Binding::Int(2)]);
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_clone_has_independent_clauses() {
        let original = Registry::table("users").where_clause("id", "=", 1);
        let copy = original.clone().where_clause("name", "=", "x");
        assert_eq!(original.bindings().len(), 1);
        assert_eq!(copy.bindings().len(), 2);
    }

    #[test]
    fn test_flatten_except() {
        let mut bindings = Bindings::default();
        bindings.extend(BindingCategory::Select, [Binding::Int(1)]);
        bindings.extend(BindingCategory::Where, [Binding::Int(2)]);
        assert_eq!(bindings.flatten_except(&[BindingCategory::Select]), vec![Binding::Int(2)]);
        assert_eq!(
            bindings.flatten_only(&[BindingCategory::Where, BindingCategory::Select]),
            vec![Binding::Int(2), Binding::Int(1)]
        );
    }
}
