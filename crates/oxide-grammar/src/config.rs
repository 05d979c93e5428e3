//! Grammar configuration and dialect selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::grammar::{
    GenericGrammar, Grammar, MySqlGrammar, PostgresGrammar, SqlServerGrammar, SqliteGrammar,
};

/// Connection-level settings a grammar compiles with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Prefix prepended to every table name.
    pub table_prefix: String,
    /// MySQL upserts reference the incoming row through an alias
    /// (`as laravel_upsert_alias`) instead of `values(col)`.
    pub use_upsert_alias: bool,
}

impl GrammarConfig {
    /// Creates a configuration without a table prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table prefix.
    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Enables the MySQL upsert alias form.
    #[must_use]
    pub const fn with_upsert_alias(mut self, enabled: bool) -> Self {
        self.use_upsert_alias = enabled;
        self
    }
}

/// The supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Generic,
    Mysql,
    Postgres,
    Sqlite,
    Sqlserver,
}

impl Dialect {
    /// Every dialect.
    pub const ALL: [Self; 5] = [
        Self::Generic,
        Self::Mysql,
        Self::Postgres,
        Self::Sqlite,
        Self::Sqlserver,
    ];

    /// Returns the lowercase dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Sqlserver => "sqlserver",
        }
    }

    /// Builds the grammar for this dialect.
    #[must_use]
    pub fn grammar(self, config: GrammarConfig) -> Box<dyn Grammar> {
        match self {
            Self::Generic => Box::new(GenericGrammar::new(config)),
            Self::Mysql => Box::new(MySqlGrammar::new(config)),
            Self::Postgres => Box::new(PostgresGrammar::new(config)),
            Self::Sqlite => Box::new(SqliteGrammar::new(config)),
            Self::Sqlserver => Box::new(SqlServerGrammar::new(config)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Self::Generic),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            "sqlserver" | "sqlsrv" | "mssql" => Ok(Self::Sqlserver),
            other => Err(GrammarError::unsupported(format!("the {other} dialect"))),
        }
    }
}
