//! Escaping and binding substitution, the log-only rendering of statements.

mod common;

use chrono::NaiveDate;
use indexmap::IndexMap;
use oxide_grammar::grammar::{quote_string, INVALID_UTF8_SENTINEL, NULL_BYTE_SENTINEL};
use oxide_grammar::{Binding, Dialect, Registry};

use common::*;

#[test]
fn test_sqlserver_text_and_binary() {
    let grammar = grammar(Dialect::Sqlserver);
    let sql = grammar.substitute_bindings_into_raw_sql(
        "select * from [users] where [email] = ? and \"buffer\" = ?",
        &[text("foo"), Binding::Bytes(b"text".to_vec())],
    );
    assert_eq!(
        sql,
        "select * from [users] where [email] = 'foo' and \"buffer\" = 0x74657874"
    );
}

#[test]
fn test_placeholders_inside_literals_are_kept() {
    let grammar = grammar(Dialect::Generic);
    let sql = grammar.substitute_bindings_into_raw_sql(
        "select '?', 'it''s ?' from \"t\" where \"a\" = ? and \"b\" ?? ?",
        &[Binding::Int(1), text("x")],
    );
    assert_eq!(
        sql,
        "select '?', 'it''s ?' from \"t\" where \"a\" = '1' and \"b\" ?? 'x'"
    );
}

#[test]
fn test_missing_bindings_leave_placeholders() {
    let grammar = grammar(Dialect::Generic);
    assert_eq!(
        grammar.substitute_bindings_into_raw_sql("a = ? and b = ?", &[Binding::Null]),
        "a = null and b = ?"
    );
}

#[test]
fn test_escape_scalars() {
    let grammar = grammar(Dialect::Mysql);
    assert_eq!(grammar.escape(&Binding::Bool(true)), "1");
    assert_eq!(grammar.escape(&Binding::Bool(false)), "0");
    assert_eq!(grammar.escape(&Binding::Int(42)), "'42'");
    assert_eq!(grammar.escape(&text("o'neil")), "'o''neil'");
    assert_eq!(grammar.escape(&Binding::Null), "null");
}

#[test]
fn test_escape_dates_per_dialect() {
    let moment = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    assert_eq!(
        grammar(Dialect::Postgres).escape(&Binding::DateTime(moment)),
        "'2024-01-02 03:04:05'"
    );
    assert_eq!(
        grammar(Dialect::Sqlserver).escape(&Binding::DateTime(moment)),
        "'2024-01-02 03:04:05.000'"
    );
}

#[test]
fn test_sentinels() {
    assert_eq!(quote_string(b"a\0b"), NULL_BYTE_SENTINEL);
    assert_eq!(quote_string(&[b'a', 0xff]), INVALID_UTF8_SENTINEL);
    assert_eq!(
        grammar(Dialect::Generic).escape(&text("nul\0here")),
        "<NullByte>"
    );
}

#[test]
fn test_named_substitution_prefers_longest_key() {
    let mut bindings = IndexMap::new();
    bindings.insert(String::from("a"), Binding::Int(1));
    bindings.insert(String::from(":ab"), text("z"));
    let sql = grammar(Dialect::Postgres).substitute_named_bindings(
        "select * from t where a = :a and ab = :ab and x::text = :missing",
        &bindings,
    );
    assert_eq!(
        sql,
        "select * from t where a = '1' and ab = 'z' and x::text = :missing"
    );
}

#[test]
fn test_raw_sql_of_a_query() {
    let query = Registry::table("users")
        .where_clause("email", "=", "a@x")
        .where_clause("active", "=", true);
    assert_eq!(
        query.to_raw_sql(grammar(Dialect::Sqlite).as_ref()).unwrap(),
        "select * from \"users\" where \"email\" = 'a@x' and \"active\" = 1"
    );
}
