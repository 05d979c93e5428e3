//! Statement forms that differ per database engine.

mod common;

use common::*;
use oxide_grammar::{Binding, Cte, Dialect, Param, Registry};

#[test]
fn test_locks() {
    let query = Registry::table("users").where_clause("id", "=", 1).lock_for_update();
    assert_eq!(
        select(Dialect::Postgres, &query),
        "select * from \"users\" where \"id\" = ? for update"
    );
    assert_eq!(
        select(Dialect::Mysql, &query),
        "select * from `users` where `id` = ? for update"
    );
    assert_eq!(
        select(Dialect::Sqlite, &query),
        "select * from \"users\" where \"id\" = ?"
    );

    let shared = Registry::table("users").shared_lock();
    assert_eq!(
        select(Dialect::Mysql, &shared),
        "select * from `users` lock in share mode"
    );
    assert_eq!(
        select(Dialect::Postgres, &shared),
        "select * from \"users\" for share"
    );
}

#[test]
fn test_truncate_per_dialect() {
    let query = Registry::table("users");

    let statements = query.to_truncate_sql(grammar(Dialect::Mysql).as_ref()).unwrap();
    assert_eq!(
        statements.keys().collect::<Vec<_>>(),
        ["truncate table `users`"]
    );

    let statements = query
        .to_truncate_sql(grammar(Dialect::Postgres).as_ref())
        .unwrap();
    assert_eq!(
        statements.keys().collect::<Vec<_>>(),
        ["truncate \"users\" restart identity cascade"]
    );

    let statements = query.to_truncate_sql(grammar(Dialect::Sqlite).as_ref()).unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements.get("delete from sqlite_sequence where name = ?"),
        Some(&vec![text("users")])
    );
    assert_eq!(statements.get("delete from \"users\""), Some(&vec![]));
}

#[test]
fn test_insert_get_id() {
    let values = row(&[("email", Param::from("a@x"))]);
    let query = Registry::table("users");

    let (sql, bindings) = query
        .to_insert_get_id_sql(grammar(Dialect::Postgres).as_ref(), &values, None)
        .unwrap();
    assert_eq!(sql, "insert into \"users\" (\"email\") values (?) returning \"id\"");
    assert_eq!(bindings, vec![text("a@x")]);

    let (sql, _) = query
        .to_insert_get_id_sql(grammar(Dialect::Sqlserver).as_ref(), &values, Some("user_id"))
        .unwrap();
    assert_eq!(
        sql,
        "set nocount on;insert into [users] ([email]) values (?);select scope_identity() as [user_id]"
    );

    let (sql, _) = query
        .to_insert_get_id_sql(grammar(Dialect::Mysql).as_ref(), &values, None)
        .unwrap();
    assert_eq!(sql, "insert into `users` (`email`) values (?)");
}

#[test]
fn test_insert_or_ignore() {
    let rows = vec![row(&[("email", Param::from("a@x"))])];
    let query = Registry::table("users");

    let (sql, _) = query
        .to_insert_or_ignore_sql(grammar(Dialect::Postgres).as_ref(), &rows)
        .unwrap();
    assert_eq!(
        sql,
        "insert into \"users\" (\"email\") values (?) on conflict do nothing"
    );

    let (sql, _) = query
        .to_insert_or_ignore_sql(grammar(Dialect::Sqlite).as_ref(), &rows)
        .unwrap();
    assert_eq!(sql, "insert or ignore into \"users\" (\"email\") values (?)");
}

#[test]
fn test_savepoints() {
    let postgres = grammar(Dialect::Postgres);
    assert!(postgres.supports_savepoints());
    assert_eq!(postgres.compile_savepoint("trans2"), "SAVEPOINT trans2");
    assert_eq!(
        postgres.compile_savepoint_rollback("trans2"),
        "ROLLBACK TO SAVEPOINT trans2"
    );

    let sqlserver = grammar(Dialect::Sqlserver);
    assert_eq!(sqlserver.compile_savepoint("trans2"), "SAVE TRANSACTION trans2");
    assert_eq!(
        sqlserver.compile_savepoint_rollback("trans2"),
        "ROLLBACK TRANSACTION trans2"
    );
}

#[test]
fn test_sqlserver_paging() {
    let query = Registry::table("users").limit(10).offset(20);
    assert_eq!(
        select(Dialect::Sqlserver, &query),
        "select * from [users] order by (SELECT 0) offset 20 rows fetch next 10 rows only"
    );
}

#[test]
fn test_union_limit_binds_to_union() {
    let query = Registry::table("users")
        .where_clause("id", "=", 1)
        .union(Registry::table("admins").where_clause("id", "=", 2))
        .limit(5);
    let grammar = grammar(Dialect::Mysql);
    let (sql, bindings) = query.to_sql(grammar.as_ref()).unwrap();
    assert_eq!(
        sql,
        "(select * from `users` where `id` = ?) union (select * from `admins` where `id` = ?) limit 5"
    );
    assert_eq!(bindings, vec![Binding::Int(1), Binding::Int(2)]);
}

#[test]
fn test_bitwise_operators_per_dialect() {
    let query = Registry::table("users").where_clause("flags", "&", 4);
    assert_eq!(
        select(Dialect::Generic, &query),
        "select * from \"users\" where \"flags\" & ?"
    );
    assert_eq!(
        select(Dialect::Mysql, &query),
        "select * from `users` where `flags` & ?"
    );
    assert_eq!(
        select(Dialect::Postgres, &query),
        "select * from \"users\" where (\"flags\" & ?)::bool"
    );
    assert_eq!(
        select(Dialect::Sqlite, &query),
        "select * from \"users\" where \"flags\" & ?"
    );
    assert_eq!(
        select(Dialect::Sqlserver, &query),
        "select * from [users] where ([flags] & ?) != 0"
    );
}

#[test]
fn test_postgres_xor_and_containment_are_bitwise() {
    let query = Registry::table("users")
        .where_clause("flags", "#", 2)
        .where_clause("net", "<<=", "10.0.0.0/8");
    let grammar = grammar(Dialect::Postgres);
    let (sql, bindings) = query.to_sql(grammar.as_ref()).unwrap();
    assert_eq!(
        sql,
        "select * from \"users\" where (\"flags\" # ?)::bool and (\"net\" <<= ?)::bool"
    );
    assert_eq!(bindings, vec![Binding::Int(2), text("10.0.0.0/8")]);
    assert_parity(&sql, &bindings);

    assert_eq!(
        select(Dialect::Mysql, &query),
        "select * from `users` where `flags` # ? and `net` <<= ?"
    );
}

#[test]
fn test_recursion_limit_with_union() {
    let query = Registry::table("tree")
        .with_cte(Cte::new("tree", Registry::table("nodes")).recursive())
        .recursion_limit(50)
        .union_all(Registry::table("other"));

    let sqlserver = select(Dialect::Sqlserver, &query);
    assert!(sqlserver.ends_with("as [temp_table] option (maxrecursion 50)"));
    assert_eq!(sqlserver.matches("option (maxrecursion").count(), 1);

    let mysql = select(Dialect::Mysql, &query);
    assert!(mysql.contains(") select /*+ SET_VAR(cte_max_recursion_depth=50) */ * from `tree`)"));
    assert!(mysql.ends_with("union all (select * from `other`)"));

    for dialect in [Dialect::Generic, Dialect::Postgres, Dialect::Sqlite] {
        let sql = select(dialect, &query);
        assert!(!sql.contains("maxrecursion"), "{dialect}: {sql}");
        assert!(!sql.contains("SET_VAR"), "{dialect}: {sql}");
        assert!(sql.ends_with("(select * from \"other\")"), "{dialect}: {sql}");
    }
}
