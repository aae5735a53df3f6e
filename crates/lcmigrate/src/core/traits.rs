//! Core traits for engine-agnostic migration.
//!
//! - [`Dialect`]: pure SQL syntax rules for one engine family
//! - [`Connection`]: a single live session against a server
//! - [`Catalog`]: engine-specific metadata queries issued over a connection

use async_trait::async_trait;

use crate::core::schema::{
    DatabaseAnalytics, DatabaseInfo, DatabaseObjects, SequenceDef, TableSchema, ViewDef,
};
use crate::core::value::{Row, SqlValue};
use crate::error::Result;

/// How parameter placeholders are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Every parameter uses the same token (`?`).
    Question,
    /// Parameters are numbered from 1 (`$1`, `$2`, ...).
    Positional,
}

/// SQL syntax strategy for different database engines.
///
/// Implementations are stateless; every downstream component is written once
/// against this trait instead of branching on the engine.
pub trait Dialect: Send + Sync {
    /// Engine identifier (`mysql`, `pgsql`).
    fn name(&self) -> &str;

    /// Quote an identifier, doubling embedded delimiters.
    ///
    /// - MySQL: `` `identifier` ``
    /// - PostgreSQL: `"identifier"`
    fn quote_ident(&self, name: &str) -> String;

    /// Quote a string literal, doubling embedded single quotes.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Parameter placeholder for the given 1-based position.
    fn param_placeholder(&self, index: usize) -> String;

    /// Whether callers must advance a counter between placeholders.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Session statement suspending foreign key enforcement.
    fn disable_fk_checks_sql(&self) -> &'static str;

    /// Session statement restoring foreign key enforcement.
    fn enable_fk_checks_sql(&self) -> &'static str;

    fn supports_sequences(&self) -> bool;

    /// Referential action the engine applies when none is declared.
    fn default_fk_action(&self) -> &'static str;

    /// Whether DROP accepts CASCADE. Engines without it need FK checks
    /// suspended while dropping.
    fn supports_drop_cascade(&self) -> bool;

    /// Upper bound on bind parameters in one statement.
    fn max_bind_params(&self) -> usize {
        65_535
    }

    /// Statement setting a sequence's current value, if sequences exist.
    fn set_sequence_value_sql(&self, sequence: &str, value: i64) -> Option<String>;

    /// Build a SELECT reading one page of a table with LIMIT/OFFSET.
    fn build_page_query(&self, table: &str, columns: &[String], limit: usize, offset: u64) -> String {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            cols,
            self.quote_ident(table),
            limit,
            offset
        )
    }
}

/// A single live database session.
///
/// One connection per side is held for the whole run and every stage goes
/// through it, which keeps session settings such as suspended FK checks in
/// effect between statements.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement without parameters, returning affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a statement with bound parameters, returning affected rows.
    async fn execute_with(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64>;

    /// Run a query and collect every row.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Column names a query would produce, without fetching rows.
    async fn column_names(&mut self, sql: &str) -> Result<Vec<String>>;

    /// Close the session.
    async fn close(self: Box<Self>);
}

/// Engine-specific catalog queries.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Version, counts and size of the connected database.
    async fn database_info(&self, conn: &mut dyn Connection, database: &str)
        -> Result<DatabaseInfo>;

    /// Base table names, sorted.
    async fn table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>>;

    /// Full definition of one table: create statement, indexes, foreign keys.
    async fn table_schema(&self, conn: &mut dyn Connection, table: &str) -> Result<TableSchema>;

    /// Views with their dependencies, in catalog order.
    async fn views(&self, conn: &mut dyn Connection) -> Result<Vec<ViewDef>>;

    /// Sequences and their current values.
    async fn sequences(&self, _conn: &mut dyn Connection) -> Result<Vec<SequenceDef>> {
        Ok(Vec::new())
    }

    /// Everything a wipe needs to drop.
    async fn objects(&self, conn: &mut dyn Connection) -> Result<DatabaseObjects>;

    /// Statistics for the `analyze` command.
    async fn analyze(&self, conn: &mut dyn Connection, database: &str)
        -> Result<DatabaseAnalytics>;
}
