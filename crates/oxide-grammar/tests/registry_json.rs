//! Query descriptions read from JSON, the way the command line tool loads
//! them.

mod common;

use common::*;
use oxide_grammar::{raw, Binding, Dialect, Registry};

#[test]
fn test_compile_description() {
    let query: Registry = serde_json::from_str(
        r#"{
            "from": "users",
            "columns": ["id", "email"],
            "wheres": [
                {"type": "Basic", "column": "votes", "operator": ">", "value": 100},
                {"type": "In", "column": "id", "values": [1, 2], "boolean": "or"},
                {"type": "Null", "column": "deleted_at", "not": true}
            ],
            "orders": [{"type": "column", "column": "id", "direction": "desc"}],
            "limit": 5
        }"#,
    )
    .unwrap();

    let (sql, bindings) = query.to_sql(grammar(Dialect::Generic).as_ref()).unwrap();
    assert_eq!(
        sql,
        "select \"id\", \"email\" from \"users\" where \"votes\" > ? or \"id\" in (?, ?) and \"deleted_at\" is not null order by \"id\" desc limit 5"
    );
    assert_eq!(
        bindings,
        vec![Binding::Int(100), Binding::Int(1), Binding::Int(2)]
    );
}

#[test]
fn test_description_with_join_and_raw_value() {
    let query: Registry = serde_json::from_str(
        r#"{
            "from": "users",
            "joins": [{
                "kind": "left",
                "table": "posts",
                "clause": {
                    "wheres": [
                        {"type": "Column", "first": "users.id", "operator": "=", "second": "posts.user_id"}
                    ]
                }
            }],
            "wheres": [
                {"type": "Basic", "column": "posts.created_at", "operator": "<", "value": {"raw": "now()"}}
            ]
        }"#,
    )
    .unwrap();

    let (sql, bindings) = query.to_sql(grammar(Dialect::Postgres).as_ref()).unwrap();
    assert_eq!(
        sql,
        "select * from \"users\" left join \"posts\" on \"users\".\"id\" = \"posts\".\"user_id\" where \"posts\".\"created_at\" < now()"
    );
    assert!(bindings.is_empty());
}

#[test]
fn test_built_query_survives_serialization() {
    let query = Registry::table("users")
        .select(["id"])
        .where_clause("email", "like", "%@x")
        .where_clause("created_at", "<", raw("now()"))
        .where_nested(|q| q.where_clause("a", "=", 1).or_where("b", "=", 2))
        .limit(3);
    let json = serde_json::to_string(&query).unwrap();
    let restored: Registry = serde_json::from_str(&json).unwrap();

    let grammar = grammar(Dialect::Mysql);
    assert_eq!(
        restored.to_sql(grammar.as_ref()).unwrap(),
        query.to_sql(grammar.as_ref()).unwrap()
    );
}

#[test]
fn test_unknown_where_type_is_rejected() {
    let result: Result<Registry, _> = serde_json::from_str(
        r#"{"from": "users", "wheres": [{"type": "Sideways", "column": "a"}]}"#,
    );
    assert!(result.is_err());
}
