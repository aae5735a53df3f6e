//! In-memory fakes for the driver seams.
//!
//! [`MockConnection`] answers queries from registered substring patterns and
//! records every statement; clones share their state so a test can keep a
//! handle after boxing one into a [`Database`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{DatabaseConfig, Engine};
use crate::core::schema::{
    DatabaseAnalytics, DatabaseInfo, DatabaseObjects, SequenceDef, TableSchema, ViewDef,
};
use crate::core::traits::{Catalog, Connection};
use crate::core::value::{Row, SqlValue};
use crate::drivers::{Connector, Database, SslMode};
use crate::error::{MigrateError, Result};
use crate::preflight::CheckResult;
use crate::report::{Prompter, Reporter, Stage};

#[derive(Debug, Default)]
struct ConnectionState {
    results: Vec<(String, Vec<Row>)>,
    columns: Vec<(String, Vec<String>)>,
    failures: Vec<(String, String)>,
    executed: Vec<String>,
    params: Vec<Vec<SqlValue<'static>>>,
    queries: Vec<String>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<ConnectionState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by the first query containing `pattern`.
    pub fn with_result(self, pattern: &str, rows: Vec<Row>) -> Self {
        self.lock().results.push((pattern.to_string(), rows));
        self
    }

    /// Column names reported for statements containing `pattern`.
    pub fn with_columns(self, pattern: &str, columns: &[&str]) -> Self {
        self.lock().columns.push((
            pattern.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Fail every statement containing `pattern`.
    pub fn fail_on(self, pattern: &str, message: &str) -> Self {
        self.lock()
            .failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Statements run through `execute`/`execute_with`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Parameters of each `execute_with` call, in order.
    pub fn params(&self) -> Vec<Vec<SqlValue<'static>>> {
        self.lock().params.clone()
    }

    /// Statements run through `query`, in order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap()
    }

    fn check_failure(&self, sql: &str) -> Result<()> {
        let state = self.lock();
        match state.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            Some((_, message)) => Err(MigrateError::query(message, sql)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.check_failure(sql)?;
        self.lock().executed.push(sql.to_string());
        Ok(0)
    }

    async fn execute_with(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64> {
        self.check_failure(sql)?;
        let mut state = self.lock();
        state.executed.push(sql.to_string());
        state
            .params
            .push(params.iter().cloned().map(SqlValue::into_owned).collect());
        Ok(0)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.check_failure(sql)?;
        let mut state = self.lock();
        state.queries.push(sql.to_string());
        Ok(state
            .results
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn column_names(&mut self, sql: &str) -> Result<Vec<String>> {
        self.check_failure(sql)?;
        let mut state = self.lock();
        state.queries.push(sql.to_string());
        Ok(state
            .columns
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, cols)| cols.clone())
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) {
        self.lock().closed = true;
    }
}

/// Catalog serving fixed definitions.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    info: DatabaseInfo,
    tables: Vec<TableSchema>,
    failing_table: Option<String>,
    views_error: Option<String>,
    views: Vec<ViewDef>,
    sequences: Vec<SequenceDef>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, info: DatabaseInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// A table whose definition cannot be read.
    pub fn with_failing_table(mut self, name: &str) -> Self {
        self.failing_table = Some(name.to_string());
        self
    }

    /// Listing views fails with `message`.
    pub fn with_views_error(mut self, message: &str) -> Self {
        self.views_error = Some(message.to_string());
        self
    }

    pub fn with_view(mut self, name: &str, create_statement: &str, dependencies: &[&str]) -> Self {
        self.views.push(ViewDef {
            name: name.to_string(),
            create_statement: create_statement.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        });
        self
    }

    pub fn with_sequence(mut self, name: &str, current_value: i64) -> Self {
        self.sequences.push(SequenceDef {
            name: name.to_string(),
            create_statement: format!("CREATE SEQUENCE \"{}\"", name),
            current_value,
            owner_table: None,
            owner_column: None,
        });
        self
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn database_info(
        &self,
        _conn: &mut dyn Connection,
        _database: &str,
    ) -> Result<DatabaseInfo> {
        Ok(self.info.clone())
    }

    async fn table_names(&self, _conn: &mut dyn Connection) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.iter().map(|t| t.name.clone()).collect();
        names.extend(self.failing_table.clone());
        names.sort();
        Ok(names)
    }

    async fn table_schema(&self, _conn: &mut dyn Connection, table: &str) -> Result<TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .cloned()
            .ok_or_else(|| MigrateError::query("no create statement returned", table))
    }

    async fn views(&self, _conn: &mut dyn Connection) -> Result<Vec<ViewDef>> {
        if let Some(message) = &self.views_error {
            return Err(MigrateError::query(message, "listing views"));
        }
        Ok(self.views.clone())
    }

    async fn sequences(&self, _conn: &mut dyn Connection) -> Result<Vec<SequenceDef>> {
        Ok(self.sequences.clone())
    }

    async fn objects(&self, _conn: &mut dyn Connection) -> Result<DatabaseObjects> {
        Ok(DatabaseObjects {
            tables: self.info.tables.clone(),
            views: self.views.iter().map(|v| v.name.clone()).collect(),
            sequences: self.sequences.iter().map(|s| s.name.clone()).collect(),
        })
    }

    async fn analyze(
        &self,
        _conn: &mut dyn Connection,
        database: &str,
    ) -> Result<DatabaseAnalytics> {
        Ok(DatabaseAnalytics {
            database: database.to_string(),
            version: self.info.version.clone(),
            table_count: self.info.table_count,
            total_size: self.info.total_size,
            ..Default::default()
        })
    }
}

/// One fake server endpoint, keyed by database name.
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    pub engine: Engine,
    pub conn: MockConnection,
    pub catalog: MockCatalog,
    pub ssl_mode: Option<SslMode>,
}

impl MockEndpoint {
    pub fn new(engine: Engine, conn: MockConnection, catalog: MockCatalog) -> Self {
        Self {
            engine,
            conn,
            catalog,
            ssl_mode: None,
        }
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    endpoints: HashMap<String, MockEndpoint>,
    missing: HashSet<String>,
    connects: Vec<String>,
    created: Vec<String>,
}

/// Connector handing out [`MockConnection`]s.
///
/// A database registered as missing fails with `DatabaseNotExists` until
/// `create_database` is called for it.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(self, database: &str, endpoint: MockEndpoint) -> Self {
        self.state
            .lock()
            .unwrap()
            .endpoints
            .insert(database.to_string(), endpoint);
        self
    }

    pub fn with_missing(self, database: &str, endpoint: MockEndpoint) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.endpoints.insert(database.to_string(), endpoint);
            state.missing.insert(database.to_string());
        }
        self
    }

    /// Databases connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.state.lock().unwrap().connects.clone()
    }

    /// Databases created, in order.
    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Database> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(config.database.clone());
        if state.missing.contains(&config.database) {
            return Err(MigrateError::DatabaseNotExists {
                database: config.database.clone(),
            });
        }
        let endpoint = state
            .endpoints
            .get(&config.database)
            .cloned()
            .ok_or_else(|| MigrateError::connection(config.display_target(), "connection refused"))?;

        let db = Database::new(
            endpoint.engine,
            &config.database,
            Box::new(endpoint.conn),
            Box::new(endpoint.catalog),
        );
        Ok(match endpoint.ssl_mode {
            Some(mode) => db.with_ssl_mode(mode),
            None => db,
        })
    }

    async fn create_database(&self, config: &DatabaseConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.missing.remove(&config.database);
        state.created.push(config.database.clone());
        Ok(())
    }
}

/// Reporter recording events as short strings (`started:data`, ...).
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn stage_started(&self, stage: Stage) {
        self.push(format!("started:{}", stage.title()));
    }

    fn stage_finished(&self, stage: Stage, _elapsed: Duration) {
        self.push(format!("finished:{}", stage.title()));
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        self.push(format!("skipped:{}:{}", stage.title(), reason));
    }

    fn check(&self, check: &CheckResult) {
        self.push(format!("check:{}:{}", check.name, check.status()));
    }

    fn table_progress(&self, table: &str, copied: u64) {
        self.push(format!("progress:{}:{}", table, copied));
    }

    fn table_finished(&self, table: &str, rows: u64, _elapsed: Duration) {
        self.push(format!("table:{}:{}", table, rows));
    }

    fn info(&self, message: &str) {
        self.push(format!("info:{}", message));
    }

    fn warn(&self, message: &str) {
        self.push(format!("warn:{}", message));
    }
}

/// Prompter answering by question prefix, recording what was asked.
#[derive(Debug)]
pub struct ScriptedPrompter {
    answers: Vec<(String, bool)>,
    fallback: bool,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Answer `fallback` to anything without a scripted answer.
    pub fn new(fallback: bool) -> Self {
        Self {
            answers: Vec::new(),
            fallback,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, prefix: &str, answer: bool) -> Self {
        self.answers.push((prefix.to_string(), answer));
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self
            .answers
            .iter()
            .find(|(prefix, _)| question.starts_with(prefix.as_str()))
            .map_or(self.fallback, |(_, answer)| *answer))
    }
}
