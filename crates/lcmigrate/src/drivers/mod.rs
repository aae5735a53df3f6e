//! Database driver implementations.
//!
//! This module provides engine-specific implementations of the core traits:
//!
//! - [`mysql`]: MySQL/MariaDB driver (mysql_async)
//! - [`postgres`]: PostgreSQL driver (tokio-postgres)
//! - [`common`]: Shared utilities (TLS, error matching)
//!
//! # Architecture
//!
//! Each driver module provides:
//! - `Dialect`: SQL syntax strategy for the engine
//! - `Connection`: one live session
//! - `Catalog`: metadata queries issued over a session
//!
//! [`Connector`] is the seam the pre-flight stage opens sessions through;
//! [`DriverConnector`] is the real implementation and tests substitute an
//! in-memory one.

pub mod common;
pub mod mysql;
pub mod postgres;

use async_trait::async_trait;

pub use common::SslMode;
pub use mysql::{MysqlCatalog, MysqlConnection, MysqlDialect};
pub use postgres::{PostgresCatalog, PostgresConnection, PostgresDialect};

use crate::config::{DatabaseConfig, Engine};
use crate::core::schema::DatabaseInfo;
use crate::core::traits::{Catalog, Connection, Dialect, PlaceholderStyle};
use crate::error::Result;

/// Dialect of either engine family, dispatched by `match`.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mysql(MysqlDialect),
    Postgres(PostgresDialect),
}

impl DialectImpl {
    /// Dialect for an engine family.
    pub fn from_engine(engine: Engine) -> Self {
        match engine {
            Engine::Mysql => DialectImpl::Mysql(MysqlDialect),
            Engine::Pgsql => DialectImpl::Postgres(PostgresDialect),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Mysql(d) => d.name(),
            DialectImpl::Postgres(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectImpl::Mysql(d) => d.quote_ident(name),
            DialectImpl::Postgres(d) => d.quote_ident(name),
        }
    }

    fn quote_literal(&self, value: &str) -> String {
        match self {
            DialectImpl::Mysql(d) => d.quote_literal(value),
            DialectImpl::Postgres(d) => d.quote_literal(value),
        }
    }

    fn param_placeholder(&self, index: usize) -> String {
        match self {
            DialectImpl::Mysql(d) => d.param_placeholder(index),
            DialectImpl::Postgres(d) => d.param_placeholder(index),
        }
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            DialectImpl::Mysql(d) => d.placeholder_style(),
            DialectImpl::Postgres(d) => d.placeholder_style(),
        }
    }

    fn disable_fk_checks_sql(&self) -> &'static str {
        match self {
            DialectImpl::Mysql(d) => d.disable_fk_checks_sql(),
            DialectImpl::Postgres(d) => d.disable_fk_checks_sql(),
        }
    }

    fn enable_fk_checks_sql(&self) -> &'static str {
        match self {
            DialectImpl::Mysql(d) => d.enable_fk_checks_sql(),
            DialectImpl::Postgres(d) => d.enable_fk_checks_sql(),
        }
    }

    fn supports_sequences(&self) -> bool {
        match self {
            DialectImpl::Mysql(d) => d.supports_sequences(),
            DialectImpl::Postgres(d) => d.supports_sequences(),
        }
    }

    fn default_fk_action(&self) -> &'static str {
        match self {
            DialectImpl::Mysql(d) => d.default_fk_action(),
            DialectImpl::Postgres(d) => d.default_fk_action(),
        }
    }

    fn supports_drop_cascade(&self) -> bool {
        match self {
            DialectImpl::Mysql(d) => d.supports_drop_cascade(),
            DialectImpl::Postgres(d) => d.supports_drop_cascade(),
        }
    }

    fn max_bind_params(&self) -> usize {
        match self {
            DialectImpl::Mysql(d) => d.max_bind_params(),
            DialectImpl::Postgres(d) => d.max_bind_params(),
        }
    }

    fn set_sequence_value_sql(&self, sequence: &str, value: i64) -> Option<String> {
        match self {
            DialectImpl::Mysql(d) => d.set_sequence_value_sql(sequence, value),
            DialectImpl::Postgres(d) => d.set_sequence_value_sql(sequence, value),
        }
    }

    fn build_page_query(&self, table: &str, columns: &[String], limit: usize, offset: u64) -> String {
        match self {
            DialectImpl::Mysql(d) => d.build_page_query(table, columns, limit, offset),
            DialectImpl::Postgres(d) => d.build_page_query(table, columns, limit, offset),
        }
    }
}

/// A connected database: one session plus the engine's catalog and dialect.
///
/// Fields are public so callers can borrow the catalog and the session at
/// the same time (`db.catalog.table_names(db.conn.as_mut())`).
pub struct Database {
    pub engine: Engine,
    pub database: String,
    pub conn: Box<dyn Connection>,
    pub catalog: Box<dyn Catalog>,
    pub dialect: DialectImpl,
    /// SSL mode the session negotiated (PostgreSQL only).
    pub ssl_mode: Option<SslMode>,
}

impl Database {
    pub fn new(
        engine: Engine,
        database: impl Into<String>,
        conn: Box<dyn Connection>,
        catalog: Box<dyn Catalog>,
    ) -> Self {
        Self {
            engine,
            database: database.into(),
            conn,
            catalog,
            dialect: DialectImpl::from_engine(engine),
            ssl_mode: None,
        }
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = Some(ssl_mode);
        self
    }

    /// Version, counts and size of this database.
    pub async fn info(&mut self) -> Result<DatabaseInfo> {
        self.catalog
            .database_info(self.conn.as_mut(), &self.database)
            .await
    }

    /// Close the underlying session.
    pub async fn close(self) {
        self.conn.close().await;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

/// Opens sessions and creates databases.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the configured database.
    ///
    /// Fails with [`MigrateError::DatabaseNotExists`](crate::MigrateError::DatabaseNotExists)
    /// when the server is reachable but the database is missing.
    async fn connect(&self, config: &DatabaseConfig) -> Result<Database>;

    /// Create the configured database on its server.
    async fn create_database(&self, config: &DatabaseConfig) -> Result<()>;
}

/// Connector backed by the real drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Database> {
        match config.engine {
            Engine::Mysql => {
                let conn = MysqlConnection::connect(config).await?;
                Ok(Database::new(
                    Engine::Mysql,
                    &config.database,
                    Box::new(conn),
                    Box::new(MysqlCatalog::new()),
                ))
            }
            Engine::Pgsql => {
                let conn = PostgresConnection::connect(config).await?;
                let ssl_mode = conn.ssl_mode();
                Ok(Database::new(
                    Engine::Pgsql,
                    &config.database,
                    Box::new(conn),
                    Box::new(PostgresCatalog::new()),
                )
                .with_ssl_mode(ssl_mode))
            }
        }
    }

    async fn create_database(&self, config: &DatabaseConfig) -> Result<()> {
        match config.engine {
            Engine::Mysql => MysqlConnection::create_database(config).await,
            Engine::Pgsql => PostgresConnection::create_database(config).await,
        }
    }
}
