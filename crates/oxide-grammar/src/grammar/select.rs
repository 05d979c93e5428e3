//! Select statement assembly.

use tracing::trace;

use super::{wheres, Component, Grammar, Paging, SelectView};
use crate::error::Result;
use crate::registry::{Aggregate, Cte, CteQuery, Distinct, Ident, Join, Order, Registry};

pub(super) fn compile_select<G: Grammar + ?Sized>(g: &G, query: &Registry) -> Result<String> {
    if query.uses_union_aggregate() {
        return compile_union_aggregate(g, query);
    }

    let view = SelectView::new(query);
    let mut sql = compile_components(g, &view)?;

    if let Some(limit) = query.recursion_limit.filter(|_| !query.has_unions()) {
        sql = g.apply_recursion_limit(sql, limit);
    }
    if !query.expressions.is_empty() {
        sql = format!("{} {sql}", g.compile_expressions(&query.expressions)?);
    }
    if query.has_unions() {
        sql = format!("{} {}", g.wrap_union(&sql), g.compile_unions(query)?);
        // statement-level limits follow the union tail
        if let Some(limit) = query.union_recursion_limit.or(query.recursion_limit) {
            sql = g.apply_recursion_limit(sql, limit);
        }
    }
    if !query.union_expressions.is_empty() {
        sql = format!("{} {sql}", g.compile_expressions(&query.union_expressions)?);
    }

    Ok(sql)
}

fn compile_components<G: Grammar + ?Sized>(g: &G, view: &SelectView<'_>) -> Result<String> {
    let query = view.query();
    let mut parts = Vec::new();

    for component in g.select_components() {
        let part = match component {
            Component::Aggregate => match &query.aggregate {
                Some(aggregate) => g.compile_aggregate(query, aggregate)?,
                None => String::new(),
            },
            Component::Columns if query.aggregate.is_none() => g.compile_columns(view)?,
            Component::Columns => String::new(),
            Component::From => match &query.from {
                Some(from) => g.compile_from(query, from)?,
                None => String::new(),
            },
            Component::IndexHint => match &query.index_hint {
                Some(hint) => g.compile_index_hint(hint)?,
                None => String::new(),
            },
            Component::Joins if query.joins.is_empty() => String::new(),
            Component::Joins => g.compile_joins(&query.joins)?,
            Component::Wheres => g.compile_wheres(query)?,
            Component::Groups => g.compile_groups(&query.groups)?,
            Component::Havings => g.compile_havings(&query.havings)?,
            Component::Orders => g.compile_orders(view.paging())?,
            Component::Limit => g.compile_limit(view.paging()),
            Component::Offset => g.compile_offset(view.paging()),
            Component::Lock => query
                .lock
                .as_ref()
                .map(|lock| g.compile_lock(lock))
                .unwrap_or_default(),
        };
        if !part.is_empty() {
            trace!(dialect = g.name(), component = ?component, sql = %part, "compiled component");
            parts.push(part);
        }
    }

    Ok(parts.join(" "))
}

/// `select count(*) as aggregate from (<select>) as "temp_table"`.
///
/// Expressions and recursion limits of the wrapped query move to the
/// outer statement so the `with` prefix stays at the front.
fn compile_union_aggregate<G: Grammar + ?Sized>(g: &G, query: &Registry) -> Result<String> {
    let Some(aggregate) = &query.aggregate else {
        return compile_select(g, query);
    };

    let mut inner = query.clone();
    inner.aggregate = None;
    inner.expressions.clear();
    inner.union_expressions.clear();
    inner.recursion_limit = None;
    inner.union_recursion_limit = None;

    let mut sql = format!(
        "{} from ({}) as {}",
        g.compile_aggregate(query, aggregate)?,
        g.compile_select(&inner)?,
        g.wrap_table("temp_table")
    );

    if let Some(limit) = query.union_recursion_limit.or(query.recursion_limit) {
        sql = g.apply_recursion_limit(sql, limit);
    }
    let expressions: Vec<Cte> = query
        .union_expressions
        .iter()
        .chain(&query.expressions)
        .cloned()
        .collect();
    if !expressions.is_empty() {
        sql = format!("{} {sql}", g.compile_expressions(&expressions)?);
    }

    Ok(sql)
}

pub(super) fn compile_aggregate<G: Grammar + ?Sized>(
    g: &G,
    query: &Registry,
    aggregate: &Aggregate,
) -> Result<String> {
    let mut column = if aggregate.columns.is_empty() {
        String::from("*")
    } else {
        g.columnize(&aggregate.columns)?
    };

    match &query.distinct {
        Distinct::On(columns) => {
            let idents: Vec<Ident> = columns.iter().map(Ident::from).collect();
            column = format!("distinct {}", g.columnize(&idents)?);
        }
        Distinct::All if column != "*" => column = format!("distinct {column}"),
        Distinct::All | Distinct::Off => {}
    }

    Ok(format!("select {}({column}) as aggregate", aggregate.function))
}

pub(super) fn compile_joins<G: Grammar + ?Sized>(g: &G, joins: &[Join]) -> Result<String> {
    let mut compiled = Vec::with_capacity(joins.len());

    for join in joins {
        let table = g.wrap_table_ident(&join.table)?;
        let target = if join.clause.joins.is_empty() {
            table
        } else {
            format!("({table} {})", g.compile_joins(&join.clause.joins)?)
        };
        let conditions = wheres::compile_conditions(g, &join.clause.wheres)?;
        let sql = if conditions.is_empty() {
            format!("{} join {target}", join.kind.as_sql())
        } else {
            format!("{} join {target} on {conditions}", join.kind.as_sql())
        };
        compiled.push(sql);
    }

    Ok(compiled.join(" "))
}

pub(super) fn compile_orders<G: Grammar + ?Sized>(g: &G, orders: &[Order]) -> Result<String> {
    if orders.is_empty() {
        return Ok(String::new());
    }

    let compiled = orders
        .iter()
        .map(|order| match order {
            Order::Column { column, direction } => {
                Ok(format!("{} {}", g.wrap_column(column)?, direction.as_sql()))
            }
            Order::Raw { sql, .. } => Ok(sql.clone()),
            Order::Random { seed } => Ok(g.compile_random(seed.as_deref())),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!("order by {}", compiled.join(", ")))
}

pub(super) fn compile_unions<G: Grammar + ?Sized>(g: &G, query: &Registry) -> Result<String> {
    let mut sql = String::new();

    for union in &query.unions {
        let keyword = if union.all { " union all " } else { " union " };
        sql.push_str(keyword);
        sql.push_str(&g.wrap_union(&g.compile_select(&union.query)?));
    }

    let paging = Paging {
        orders: &query.union_orders,
        limit: query.union_limit,
        offset: query.union_offset,
    };
    for component in g.select_components() {
        let part = match component {
            Component::Orders => g.compile_orders(paging)?,
            Component::Limit => g.compile_limit(paging),
            Component::Offset => g.compile_offset(paging),
            _ => continue,
        };
        if !part.is_empty() {
            sql.push(' ');
            sql.push_str(&part);
        }
    }

    Ok(sql.trim_start().to_owned())
}

pub(super) fn compile_expressions<G: Grammar + ?Sized>(
    g: &G,
    expressions: &[Cte],
) -> Result<String> {
    if expressions.is_empty() {
        return Ok(String::new());
    }

    let recursive = if expressions.iter().any(|cte| cte.recursive) {
        g.recursive_keyword()
    } else {
        ""
    };

    let mut statements = Vec::with_capacity(expressions.len());
    for cte in expressions {
        let columns = if cte.columns.is_empty() {
            String::new()
        } else {
            let idents: Vec<Ident> = cte.columns.iter().map(Ident::from).collect();
            format!("({}) ", g.columnize(&idents)?)
        };
        let body = match &cte.query {
            CteQuery::Query(query) => g.compile_select(query)?,
            CteQuery::Raw { sql, .. } => sql.clone(),
        };
        let cycle = match &cte.cycle {
            Some(cycle) => g.compile_cycle(cycle)?,
            None => String::new(),
        };
        statements.push(format!(
            "{} {columns}as {}({body}){cycle}",
            g.wrap_table(&cte.name),
            g.compile_materialized(cte.materialized)
        ));
    }

    Ok(format!("with {recursive}{}", statements.join(", ")))
}
