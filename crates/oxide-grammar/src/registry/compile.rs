//! Statement entry points: SQL text plus the bindings it consumes.

use indexmap::IndexMap;
use tracing::debug;

use super::{Registry, UpsertUpdate};
use crate::error::Result;
use crate::grammar::{Grammar, Row};
use crate::value::Binding;

/// A compiled statement: SQL text and its positional bindings.
pub type Compiled = (String, Vec<Binding>);

fn compiled<G: Grammar + ?Sized>(
    grammar: &G,
    statement: &'static str,
    sql: String,
    bindings: Vec<Binding>,
) -> Compiled {
    debug!(
        dialect = grammar.name(),
        statement,
        bindings = bindings.len(),
        "compiled statement"
    );
    (sql, bindings)
}

impl Registry {
    /// Compiles the select statement.
    ///
    /// # Errors
    ///
    /// Fails when the grammar cannot express a clause or a clause is malformed.
    pub fn to_sql<G: Grammar + ?Sized>(&self, grammar: &G) -> Result<Compiled> {
        let sql = grammar.compile_select(self)?;
        Ok(compiled(grammar, "select", sql, self.bindings()))
    }

    /// Compiles an existence check over the select.
    pub fn to_exists_sql<G: Grammar + ?Sized>(&self, grammar: &G) -> Result<Compiled> {
        let sql = grammar.compile_exists(self)?;
        let bindings = grammar.prepare_bindings_for_exists(self);
        Ok(compiled(grammar, "exists", sql, bindings))
    }

    /// Compiles a batch insert into the target table.
    pub fn to_insert_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        rows: &[Row],
    ) -> Result<Compiled> {
        let sql = grammar.compile_insert(self, rows)?;
        let bindings = grammar.prepare_bindings_for_insert(rows)?;
        Ok(compiled(grammar, "insert", sql, bindings))
    }

    /// Compiles a batch insert skipping rows that violate constraints.
    pub fn to_insert_or_ignore_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        rows: &[Row],
    ) -> Result<Compiled> {
        let sql = grammar.compile_insert_or_ignore(self, rows)?;
        let bindings = grammar.prepare_bindings_for_insert(rows)?;
        Ok(compiled(grammar, "insert or ignore", sql, bindings))
    }

    /// Compiles a single-row insert returning the generated key.
    pub fn to_insert_get_id_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        row: &Row,
        sequence: Option<&str>,
    ) -> Result<Compiled> {
        let sql = grammar.compile_insert_get_id(self, row, sequence)?;
        let bindings = grammar.prepare_bindings_for_insert(std::slice::from_ref(row))?;
        Ok(compiled(grammar, "insert get id", sql, bindings))
    }

    /// Compiles `insert into <table> (columns) <select>`.
    pub fn to_insert_using_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        columns: &[&str],
        source: &Self,
    ) -> Result<Compiled> {
        let columns: Vec<String> = columns.iter().map(|c| String::from(*c)).collect();
        let select = grammar.compile_select(source)?;
        let sql = grammar.compile_insert_using(self, &columns, &select)?;
        Ok(compiled(grammar, "insert using", sql, source.bindings()))
    }

    /// Compiles an insert-using that skips rows violating constraints.
    pub fn to_insert_or_ignore_using_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        columns: &[&str],
        source: &Self,
    ) -> Result<Compiled> {
        let columns: Vec<String> = columns.iter().map(|c| String::from(*c)).collect();
        let select = grammar.compile_select(source)?;
        let sql = grammar.compile_insert_or_ignore_using(self, &columns, &select)?;
        Ok(compiled(grammar, "insert or ignore using", sql, source.bindings()))
    }

    /// Compiles an update of the matching rows.
    pub fn to_update_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        values: &Row,
    ) -> Result<Compiled> {
        let sql = grammar.compile_update(self, values)?;
        let bindings = grammar.prepare_bindings_for_update(self, values)?;
        Ok(compiled(grammar, "update", sql, bindings))
    }

    /// Compiles an update that reads the joined tables through `from`.
    pub fn to_update_from_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        values: &Row,
    ) -> Result<Compiled> {
        let sql = grammar.compile_update_from(self, values)?;
        let bindings = grammar.prepare_bindings_for_update_from(self, values)?;
        Ok(compiled(grammar, "update from", sql, bindings))
    }

    /// Compiles a delete of the matching rows.
    pub fn to_delete_sql<G: Grammar + ?Sized>(&self, grammar: &G) -> Result<Compiled> {
        let sql = grammar.compile_delete(self)?;
        let bindings = grammar.prepare_bindings_for_delete(self);
        Ok(compiled(grammar, "delete", sql, bindings))
    }

    /// Compiles an insert that updates rows conflicting on `unique_by`.
    pub fn to_upsert_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
        rows: &[Row],
        unique_by: &[&str],
        update: &[UpsertUpdate],
    ) -> Result<Compiled> {
        let unique_by: Vec<String> = unique_by.iter().map(|c| String::from(*c)).collect();
        let sql = grammar.compile_upsert(self, rows, &unique_by, update)?;
        let bindings = grammar.prepare_bindings_for_upsert(rows, update)?;
        Ok(compiled(grammar, "upsert", sql, bindings))
    }

    /// Compiles the statements emptying the target table.
    pub fn to_truncate_sql<G: Grammar + ?Sized>(
        &self,
        grammar: &G,
    ) -> Result<IndexMap<String, Vec<Binding>>> {
        let statements = grammar.compile_truncate(self)?;
        debug!(
            dialect = grammar.name(),
            statements = statements.len(),
            "compiled truncate"
        );
        Ok(statements)
    }

    /// Compiles the select with its bindings inlined, for logs and EXPLAIN.
    pub fn to_raw_sql<G: Grammar + ?Sized>(&self, grammar: &G) -> Result<String> {
        let (sql, bindings) = self.to_sql(grammar)?;
        Ok(grammar.substitute_bindings_into_raw_sql(&sql, &bindings))
    }
}
