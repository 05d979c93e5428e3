//! JSON column updates: sibling paths under one column merge into a single
//! assignment on every dialect that supports JSON.

mod common;

use common::*;
use oxide_grammar::{Binding, Dialect, Param, Registry};

const JSON_DIALECTS: [Dialect; 4] = [
    Dialect::Mysql,
    Dialect::Postgres,
    Dialect::Sqlite,
    Dialect::Sqlserver,
];

#[test]
fn test_sibling_paths_make_one_assignment() {
    let query = Registry::table("users").where_clause("id", "=", 1);
    let values = row(&[
        ("meta->tags", Param::from("admin")),
        ("meta->name->first", Param::from("Ada")),
    ]);
    for dialect in JSON_DIALECTS {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_update_sql(grammar.as_ref(), &values).unwrap();
        let assignment = format!("{} = ", grammar.wrap("meta").unwrap());
        assert_eq!(sql.matches(&assignment).count(), 1, "{dialect}: {sql}");
        assert_parity(&sql, &bindings);
    }
}

#[test]
fn test_json_and_plain_columns_mix() {
    let query = Registry::table("users").where_clause("id", "=", 1);
    let values = row(&[
        ("name", Param::from("Ada")),
        ("meta->active", Param::from(true)),
    ]);
    for dialect in JSON_DIALECTS {
        let grammar = grammar(dialect);
        let (sql, bindings) = query.to_update_sql(grammar.as_ref(), &values).unwrap();
        assert_parity(&sql, &bindings);
        assert_eq!(bindings.last(), Some(&Binding::Int(1)));
    }
}

#[test]
fn test_generic_grammar_rejects_json_updates() {
    let values = row(&[("meta->tags", Param::from("admin"))]);
    let err = Registry::table("users")
        .to_update_sql(grammar(Dialect::Generic).as_ref(), &values)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "This database engine does not support JSON updates."
    );
}

#[test]
fn test_mysql_update_literal() {
    let values = row(&[
        ("meta->tags", Param::from("admin")),
        ("meta->name->first", Param::from("Ada")),
    ]);
    let (sql, bindings) = Registry::table("users")
        .to_update_sql(grammar(Dialect::Mysql).as_ref(), &values)
        .unwrap();
    assert!(sql.starts_with("update `users` set `meta` = "), "{sql}");
    assert_eq!(bindings.len(), placeholder_count(&sql));
}
