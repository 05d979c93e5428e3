//! # oxide-grammar
//!
//! A dialect-aware SQL grammar that compiles query descriptions into SQL
//! text plus positional bindings.
//!
//! This crate provides:
//! - A plain-data [`Registry`] holding one query's clauses, built with
//!   consuming builder methods
//! - A [`Grammar`] trait whose default methods implement generic (ANSI) SQL,
//!   and grammars for MySQL, PostgreSQL, SQLite and SQL Server
//! - JSON column selectors (`column->path`) and JSON column updates
//! - Literal escaping and binding substitution for logging
//!
//! ## Compiling a select
//!
//! ```rust
//! use oxide_grammar::{Binding, Dialect, GrammarConfig, Registry};
//!
//! let grammar = Dialect::Mysql.grammar(GrammarConfig::new());
//! let (sql, bindings) = Registry::table("users")
//!     .select(["id", "email"])
//!     .where_clause("items->sku", "=", "A-1")
//!     .limit(10)
//!     .to_sql(grammar.as_ref())
//!     .unwrap();
//!
//! assert_eq!(
//!     sql,
//!     "select `id`, `email` from `users` where json_unquote(json_extract(`items`, '$.\"sku\"')) = ? limit 10"
//! );
//! assert_eq!(bindings, vec![Binding::Text(String::from("A-1"))]);
//! ```
//!
//! ## Raw expressions
//!
//! An [`Expression`] is emitted verbatim: it is never quoted and never
//! becomes a binding.
//!
//! ```rust
//! use oxide_grammar::{raw, GenericGrammar, Registry};
//!
//! let (sql, bindings) = Registry::table("users")
//!     .where_clause("created_at", "<", raw("now()"))
//!     .to_sql(&GenericGrammar::default())
//!     .unwrap();
//!
//! assert_eq!(sql, "select * from \"users\" where \"created_at\" < now()");
//! assert!(bindings.is_empty());
//! ```

pub mod config;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod registry;
pub mod value;

pub use config::{Dialect, GrammarConfig};
pub use error::{GrammarError, Result};
pub use expression::{raw, Expression};
pub use grammar::{
    GenericGrammar, Grammar, MySqlGrammar, PostgresGrammar, Row, SqlServerGrammar, SqliteGrammar,
};
pub use registry::{Compiled, Cte, Direction, Ident, JoinType, Lock, Registry, UpsertUpdate};
pub use value::{Binding, Param, ToBinding, WireType};
