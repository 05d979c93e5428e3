//! Where and having predicate compilation.

use super::wrap::remove_leading_boolean;
use super::Grammar;
use crate::error::{GrammarError, Result};
use crate::registry::{Having, HavingKind, Where, WhereKind};

/// Compiles a clause list without its keyword.
pub(crate) fn compile_conditions<G: Grammar + ?Sized>(
    g: &G,
    wheres: &[Where],
) -> Result<String> {
    if wheres.is_empty() {
        return Ok(String::new());
    }
    let mut compiled = Vec::with_capacity(wheres.len());
    for clause in wheres {
        compiled.push(format!("{} {}", clause.boolean.as_sql(), g.compile_where(clause)?));
    }
    Ok(remove_leading_boolean(&compiled.join(" ")).to_owned())
}

pub(super) fn compile_having_conditions<G: Grammar + ?Sized>(
    g: &G,
    havings: &[Having],
) -> Result<String> {
    if havings.is_empty() {
        return Ok(String::new());
    }
    let mut compiled = Vec::with_capacity(havings.len());
    for having in havings {
        compiled.push(format!("{} {}", having.boolean.as_sql(), g.compile_having(having)?));
    }
    Ok(remove_leading_boolean(&compiled.join(" ")).to_owned())
}

fn negate(sql: String, not: bool) -> String {
    if not {
        format!("not ({sql})")
    } else {
        sql
    }
}

pub(super) fn compile_where<G: Grammar + ?Sized>(g: &G, clause: &Where) -> Result<String> {
    let not = clause.not;

    let sql = match &clause.kind {
        WhereKind::Basic {
            column,
            operator,
            value,
        } if g.bitwise_operators().contains(&operator.as_str()) => {
            negate(g.where_bitwise(column, operator, value)?, not)
        }
        WhereKind::Basic {
            column,
            operator,
            value,
        } => negate(g.where_basic(column, operator, value)?, not),
        WhereKind::Raw { sql, .. } => negate(sql.clone(), not),
        WhereKind::Expression { expression } => negate(expression.value().to_owned(), not),
        WhereKind::Bitwise {
            column,
            operator,
            value,
        } => negate(g.where_bitwise(column, operator, value)?, not),
        WhereKind::In { column, values } => {
            if values.is_empty() {
                return Ok(String::from(if not { "1 = 1" } else { "0 = 1" }));
            }
            let keyword = if not { "not in" } else { "in" };
            let params: Vec<_> = values.iter().collect();
            format!("{} {keyword} ({})", g.wrap_column(column)?, g.parameterize(&params))
        }
        WhereKind::InRaw { column, values } => {
            if values.is_empty() {
                return Ok(String::from(if not { "1 = 1" } else { "0 = 1" }));
            }
            let keyword = if not { "not in" } else { "in" };
            let values: Vec<String> = values.iter().map(i64::to_string).collect();
            format!("{} {keyword} ({})", g.wrap_column(column)?, values.join(", "))
        }
        WhereKind::Null { column } => g.where_null(column, not)?,
        WhereKind::Between { column, min, max } => {
            let keyword = if not { "not between" } else { "between" };
            format!(
                "{} {keyword} {} and {}",
                g.wrap_column(column)?,
                g.parameter(min),
                g.parameter(max)
            )
        }
        WhereKind::BetweenColumns { column, min, max } => {
            let keyword = if not { "not between" } else { "between" };
            format!(
                "{} {keyword} {} and {}",
                g.wrap_column(column)?,
                g.wrap_column(min)?,
                g.wrap_column(max)?
            )
        }
        WhereKind::Date {
            part,
            column,
            operator,
            value,
        } => negate(g.where_date(*part, column, operator, value)?, not),
        WhereKind::Column {
            first,
            operator,
            second,
        } => negate(
            format!("{} {operator} {}", g.wrap_column(first)?, g.wrap_column(second)?),
            not,
        ),
        WhereKind::Nested { query } => {
            let conditions = compile_conditions(g, &query.wheres)?;
            if conditions.is_empty() {
                return Err(GrammarError::invalid("nested where group has no conditions"));
            }
            let prefix = if not { "not " } else { "" };
            format!("{prefix}({conditions})")
        }
        WhereKind::Sub {
            column,
            operator,
            query,
        } => negate(
            format!("{} {operator} ({})", g.wrap_column(column)?, g.compile_select(query)?),
            not,
        ),
        WhereKind::Exists { query } => {
            let keyword = if not { "not exists" } else { "exists" };
            format!("{keyword} ({})", g.compile_select(query)?)
        }
        WhereKind::RowValues {
            columns,
            operator,
            values,
        } => {
            if columns.len() != values.len() {
                return Err(GrammarError::invalid(
                    "row values need as many values as columns",
                ));
            }
            let params: Vec<_> = values.iter().collect();
            negate(
                format!("({}) {operator} ({})", g.columnize(columns)?, g.parameterize(&params)),
                not,
            )
        }
        WhereKind::JsonBoolean {
            column,
            operator,
            value,
        } => negate(g.where_json_boolean(column, operator, *value)?, not),
        WhereKind::JsonContains { column, .. } => {
            let prefix = if not { "not " } else { "" };
            format!("{prefix}{}", g.compile_json_contains(column, "?")?)
        }
        WhereKind::JsonContainsKey { column } => {
            let prefix = if not { "not " } else { "" };
            format!("{prefix}{}", g.compile_json_contains_key(column)?)
        }
        WhereKind::JsonLength {
            column,
            operator,
            value,
        } => negate(g.compile_json_length(column, operator, &g.parameter(value))?, not),
        WhereKind::Fulltext {
            columns,
            value,
            options,
        } => negate(g.where_full_text(columns, value, options)?, not),
    };

    Ok(sql)
}

pub(super) fn compile_having<G: Grammar + ?Sized>(g: &G, having: &Having) -> Result<String> {
    let not = having.not;

    let sql = match &having.kind {
        HavingKind::Basic {
            column,
            operator,
            value,
        } if g.bitwise_operators().contains(&operator.as_str()) => negate(
            format!(
                "({} {operator} {}) != 0",
                g.wrap_column(column)?,
                g.parameter(value)
            ),
            not,
        ),
        HavingKind::Basic {
            column,
            operator,
            value,
        } => negate(
            format!("{} {operator} {}", g.wrap_column(column)?, g.parameter(value)),
            not,
        ),
        HavingKind::Raw { sql, .. } => negate(sql.clone(), not),
        HavingKind::Expression { expression } => negate(expression.value().to_owned(), not),
        HavingKind::Between { column, min, max } => {
            let keyword = if not { "not between" } else { "between" };
            format!(
                "{} {keyword} {} and {}",
                g.wrap_column(column)?,
                g.parameter(min),
                g.parameter(max)
            )
        }
        HavingKind::Null { column } => {
            let keyword = if not { "is not null" } else { "is null" };
            format!("{} {keyword}", g.wrap_column(column)?)
        }
        HavingKind::Nested { query } => {
            let conditions = compile_having_conditions(g, &query.havings)?;
            if conditions.is_empty() {
                return Err(GrammarError::invalid("nested having group has no conditions"));
            }
            let prefix = if not { "not " } else { "" };
            format!("{prefix}({conditions})")
        }
        HavingKind::Bitwise {
            column,
            operator,
            value,
        } => negate(
            format!(
                "({} {operator} {}) != 0",
                g.wrap_column(column)?,
                g.parameter(value)
            ),
            not,
        ),
    };

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use crate::expression::raw;
    use crate::grammar::{GenericGrammar, Grammar};
    use crate::registry::{Registry, Where, WhereKind};
    use crate::value::{Binding, Param};

    fn sql(query: &Registry) -> String {
        GenericGrammar::default().compile_select(query).unwrap()
    }

    #[test]
    fn test_leading_boolean_is_stripped() {
        let query = Registry::table("users")
            .or_where("a", "=", 1)
            .where_clause("b", "=", 2);
        assert_eq!(sql(&query), "select * from \"users\" where \"a\" = ? and \"b\" = ?");
    }

    #[test]
    fn test_empty_in_tautologies() {
        let query = Registry::table("users").where_in("id", Vec::<i64>::new());
        assert_eq!(sql(&query), "select * from \"users\" where 0 = 1");
        let query = Registry::table("users").where_not_in("id", Vec::<i64>::new());
        assert_eq!(sql(&query), "select * from \"users\" where 1 = 1");
        let query = Registry::table("users").where_integer_in_raw("id", vec![1, 2]);
        assert_eq!(sql(&query), "select * from \"users\" where \"id\" in (1, 2)");
    }

    #[test]
    fn test_in_with_expression_value() {
        let query =
            Registry::table("users").where_in("id", vec![Param::from(1), Param::from(raw("2"))]);
        assert_eq!(sql(&query), "select * from \"users\" where \"id\" in (?, 2)");
    }

    #[test]
    fn test_null_and_between() {
        let query = Registry::table("users")
            .where_clause("deleted_at", "=", None::<i64>)
            .where_not_null("email")
            .where_between("age", 18, 30)
            .where_not_between("score", 1, 2);
        assert_eq!(
            sql(&query),
            "select * from \"users\" where \"deleted_at\" is null and \"email\" is not null and \"age\" between ? and ? and \"score\" not between ? and ?"
        );
        assert_eq!(query.bindings().len(), 4);
    }

    #[test]
    fn test_nested_and_not() {
        let query = Registry::table("users")
            .where_clause("a", "=", 1)
            .or_where_nested(|q| q.where_clause("b", "=", 2).where_clause("c", "=", 3))
            .where_not("d", "=", 4);
        assert_eq!(
            sql(&query),
            "select * from \"users\" where \"a\" = ? or (\"b\" = ? and \"c\" = ?) and not (\"d\" = ?)"
        );
    }

    #[test]
    fn test_not_flag_on_plain_predicate() {
        let mut query = Registry::table("users");
        query.wheres.push(Where {
            not: true,
            ..Where::new(WhereKind::Raw {
                sql: String::from("x > 1"),
                bindings: vec![],
            })
        });
        assert_eq!(sql(&query), "select * from \"users\" where not (x > 1)");
    }

    #[test]
    fn test_question_mark_operators_are_doubled() {
        let query = Registry::table("users").where_clause("tags", "?|", "a");
        assert_eq!(sql(&query), "select * from \"users\" where \"tags\" ??| ?");
    }

    #[test]
    fn test_exists_and_sub() {
        let query = Registry::table("users")
            .where_exists(Registry::table("posts").where_column("posts.user_id", "=", "users.id"))
            .where_sub("id", "in", Registry::table("admins").select(["user_id"]));
        assert_eq!(
            sql(&query),
            "select * from \"users\" where exists (select * from \"posts\" where \"posts\".\"user_id\" = \"users\".\"id\") and \"id\" in (select \"user_id\" from \"admins\")"
        );
    }

    #[test]
    fn test_row_values_mismatch_is_invalid() {
        let query = Registry::table("users").where_row_values(["a", "b"], "=", [1]);
        let err = GenericGrammar::default().compile_select(&query).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid clause: row values need as many values as columns"
        );

        let query = Registry::table("users").where_row_values(["a", "b"], "<", [1, 2]);
        assert_eq!(sql(&query), "select * from \"users\" where (\"a\", \"b\") < (?, ?)");
    }

    #[test]
    fn test_date_wheres() {
        let query = Registry::table("users").where_year("created_at", "=", 2024);
        assert_eq!(sql(&query), "select * from \"users\" where year(\"created_at\") = ?");
    }

    #[test]
    fn test_json_wheres_unsupported_generically() {
        let query = Registry::table("users").where_json_contains_key("meta->a");
        let err = GenericGrammar::default().compile_select(&query).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This database engine does not support JSON contains key operations."
        );
    }

    #[test]
    fn test_havings() {
        let query = Registry::table("users")
            .group_by(["email"])
            .having("email", ">", 1)
            .or_having("score", "&", 4)
            .having_between("age", 1, 2)
            .having_null("deleted_at")
            .having_nested(|q| q.having("a", "=", 1).or_having("b", "=", 2));
        assert_eq!(
            sql(&query),
            "select * from \"users\" group by \"email\" having \"email\" > ? or (\"score\" & ?) != 0 and \"age\" between ? and ? and \"deleted_at\" is null and (\"a\" = ? or \"b\" = ?)"
        );
        assert_eq!(
            query.bindings(),
            vec![
                Binding::Int(1),
                Binding::Int(4),
                Binding::Int(1),
                Binding::Int(2),
                Binding::Int(1),
                Binding::Int(2)
            ]
        );
    }
}
