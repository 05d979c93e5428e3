//! Every compiled statement carries exactly one binding per placeholder,
//! however deeply the clauses nest.

mod common;

use common::*;
use oxide_grammar::{raw, Binding, Dialect, Direction, JoinType, Param, Registry, UpsertUpdate};

fn nested_query() -> Registry {
    let recent = Registry::table("posts")
        .select(["user_id"])
        .where_clause("created_at", ">", "2024-01-01");
    let admins = Registry::table("admins")
        .select(["id", "email"])
        .select_raw("? as marker", vec![Binding::Int(2)])
        .where_clause("level", ">=", 9);

    Registry::table("users")
        .with_expression("recent", recent)
        .select(["users.id", "users.email"])
        .select_raw("? as marker", vec![Binding::Int(1)])
        .join_with(JoinType::Left, "profiles", |join| {
            join.on("profiles.user_id", "=", "users.id")
                .where_clause("profiles.public", "=", true)
        })
        .where_in("users.id", [10, 11, 12])
        .where_nested(|q| q.where_clause("votes", ">", 10).or_where_null("banned_at"))
        .where_exists(
            Registry::table("recent")
                .where_column("recent.user_id", "=", "users.id")
                .where_clause("recent.flag", "=", 3),
        )
        .group_by(["users.id", "users.email"])
        .having("count_posts", ">", 2)
        .order_by_raw("field(?, ?)", vec![Binding::Int(4), Binding::Int(5)])
        .union(admins)
}

#[test]
fn test_nested_select_parity_across_dialects() {
    let query = nested_query();
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_sql(grammar.as_ref()).unwrap();
        assert_parity(&sql, &bindings);
        assert_eq!(bindings.len(), 13, "{dialect}: {sql}");
    }
}

#[test]
fn test_bindings_follow_clause_order() {
    let (_, bindings) = nested_query()
        .to_sql(grammar(Dialect::Generic).as_ref())
        .unwrap();
    assert_eq!(
        bindings,
        vec![
            text("2024-01-01"),
            Binding::Int(1),
            Binding::Bool(true),
            Binding::Int(10),
            Binding::Int(11),
            Binding::Int(12),
            Binding::Int(10),
            Binding::Int(3),
            Binding::Int(2),
            Binding::Int(4),
            Binding::Int(5),
            Binding::Int(2),
            Binding::Int(9),
        ]
    );
}

#[test]
fn test_exists_parity() {
    let query = Registry::table("users")
        .select_raw("? as marker", vec![Binding::Int(1)])
        .where_clause("votes", ">", 3);
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_exists_sql(grammar.as_ref()).unwrap();
        assert_parity(&sql, &bindings);
    }
}

#[test]
fn test_joined_update_parity() {
    let query = Registry::table("users")
        .with_expression(
            "flagged",
            Registry::table("flags").where_clause("kind", "=", "spam"),
        )
        .join_with(JoinType::Inner, "posts", |join| {
            join.on("users.id", "=", "posts.user_id")
                .where_clause("posts.kind", "=", "draft")
        })
        .where_clause("posts.score", "<", 0);
    let values = row(&[
        ("name", Param::from("x")),
        ("votes", Param::from(raw("votes + 1"))),
    ]);
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_update_sql(grammar.as_ref(), &values).unwrap();
        assert_parity(&sql, &bindings);
        assert_eq!(bindings.len(), 4, "{dialect}: {sql}");
    }
}

#[test]
fn test_limited_delete_parity() {
    let query = Registry::table("users")
        .join("posts", "users.id", "=", "posts.user_id")
        .where_clause("posts.score", "<", 0)
        .order_by("users.id", Direction::Asc)
        .limit(5);
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_delete_sql(grammar.as_ref()).unwrap();
        assert_parity(&sql, &bindings);
        assert_eq!(bindings, vec![Binding::Int(0)], "{dialect}: {sql}");
    }
}

#[test]
fn test_insert_and_upsert_parity() {
    let rows = vec![
        row(&[("email", Param::from("a@x")), ("votes", Param::from(1))]),
        row(&[("email", Param::from("b@x")), ("votes", Param::from(2))]),
    ];
    let update = [UpsertUpdate::Value(String::from("votes"), Param::from(0))];
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = Registry::table("users")
            .to_insert_sql(grammar.as_ref(), &rows)
            .unwrap();
        assert_parity(&sql, &bindings);
        if dialect == Dialect::Generic {
            continue;
        }
        let (sql, bindings) = Registry::table("users")
            .to_upsert_sql(grammar.as_ref(), &rows, &["email"], &update)
            .unwrap();
        assert_parity(&sql, &bindings);
    }
}

#[test]
fn test_json_where_parity() {
    let query = Registry::table("users")
        .where_clause("meta->active", "=", true)
        .where_json_contains("meta->tags", serde_json::json!(["a"]))
        .where_json_length("meta->tags", ">", 1)
        .where_json_contains_key("meta->name");
    for dialect in [Dialect::Mysql, Dialect::Postgres, Dialect::Sqlserver] {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_sql(grammar.as_ref()).unwrap();
        assert_parity(&sql, &bindings);
    }
}

#[test]
fn test_bitwise_and_recursion_limit_keep_parity() {
    let query = Registry::table("tree")
        .with_recursive_expression(
            "tree",
            Registry::table("nodes").where_clause("flags", "#", 1),
            &["id"],
        )
        .where_clause("flags", "&", 4)
        .recursion_limit(10)
        .union_all(Registry::table("other").where_clause("mask", "<<=", 8))
        .limit(3);
    for dialect in Dialect::ALL {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_sql(grammar.as_ref()).unwrap();
        assert_parity(&sql, &bindings);
        assert_eq!(bindings, vec![Binding::Int(1), Binding::Int(4), Binding::Int(8)]);
    }
}
