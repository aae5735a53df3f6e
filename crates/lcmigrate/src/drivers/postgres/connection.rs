//! PostgreSQL session built on tokio-postgres.
//!
//! Reads use the simple-query protocol, so every value arrives as text and no
//! per-type decoding is needed. Bound parameters are sent in text format for
//! the same reason; the server parses them against the column types.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{Format, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::traits::Connection;
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::{message_matches, pg_connector, SslMode};
use crate::error::{MigrateError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maintenance database used when creating the target database.
const MAINTENANCE_DATABASE: &str = "postgres";

/// One PostgreSQL session.
pub struct PostgresConnection {
    client: Client,
    ssl_mode: SslMode,
}

impl PostgresConnection {
    /// Connect to the configured database, negotiating SSL.
    ///
    /// Modes are tried in [`SslMode::NEGOTIATION_ORDER`]. A missing database
    /// stops the negotiation immediately with
    /// [`MigrateError::DatabaseNotExists`].
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::negotiate(config, &config.database).await
    }

    /// Create the configured database through the maintenance database.
    pub async fn create_database(config: &DatabaseConfig) -> Result<()> {
        let mut admin = Self::negotiate(config, MAINTENANCE_DATABASE).await?;
        let sql = format!(
            "CREATE DATABASE \"{}\"",
            config.database.replace('"', "\"\"")
        );
        admin.execute(&sql).await?;
        info!("Created PostgreSQL database {}", config.database);
        Box::new(admin).close().await;
        Ok(())
    }

    /// SSL mode the session was established with.
    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    async fn negotiate(config: &DatabaseConfig, database: &str) -> Result<Self> {
        let mut last_error = None;

        for mode in SslMode::NEGOTIATION_ORDER {
            match Self::open(config, database, mode).await {
                Ok(client) => {
                    info!(
                        "Connected to PostgreSQL: {}:{}/{} (sslmode={})",
                        config.host,
                        config.effective_port(),
                        database,
                        mode
                    );
                    return Ok(Self {
                        client,
                        ssl_mode: mode,
                    });
                }
                Err(e) if is_missing_database(&e) => {
                    return Err(MigrateError::DatabaseNotExists {
                        database: database.to_string(),
                    });
                }
                Err(e) => {
                    debug!("PostgreSQL connect with sslmode={} failed: {}", mode, e);
                    last_error = Some(e);
                }
            }
        }

        let message = last_error
            .map(|e| describe(&e))
            .unwrap_or_else(|| "no SSL mode succeeded".to_string());
        Err(MigrateError::connection(config.display_target(), message))
    }

    async fn open(
        config: &DatabaseConfig,
        database: &str,
        mode: SslMode,
    ) -> std::result::Result<Client, tokio_postgres::Error> {
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&config.host)
            .port(config.effective_port())
            .dbname(database)
            .user(&config.user)
            .password(&config.password)
            .ssl_mode(mode.to_pg())
            .connect_timeout(CONNECT_TIMEOUT);

        let tls = match pg_connector(mode) {
            Ok(tls) => tls,
            Err(e) => {
                warn!("TLS setup failed, connecting without TLS: {}", e);
                None
            }
        };

        let client = match tls {
            Some(tls) => {
                let (client, connection) = pg_config.connect(tls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("PostgreSQL connection closed: {}", e);
                    }
                });
                client
            }
            None => {
                let (client, connection) = pg_config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("PostgreSQL connection closed: {}", e);
                    }
                });
                client
            }
        };

        client.simple_query("SELECT 1").await?;
        Ok(client)
    }
}

/// SQLSTATE 3D000, or the server's wording when no code is available.
fn is_missing_database(err: &tokio_postgres::Error) -> bool {
    if err.code() == Some(&SqlState::INVALID_CATALOG_NAME) {
        return true;
    }
    let message = describe(err);
    message_matches(&message, &["database"]) && message_matches(&message, &["does not exist"])
}

/// Error text including the server message, which `Display` omits.
fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => match err.source() {
            Some(source) => format!("{}: {}", err, source),
            None => err.to_string(),
        },
    }
}

fn query_error(err: tokio_postgres::Error, sql: &str) -> MigrateError {
    const MAX: usize = 120;
    let context = match sql.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    };
    MigrateError::query(describe(&err), context)
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| query_error(e, sql))?;

        Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum())
    }

    async fn execute_with(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64> {
        let wrapped: Vec<TextParam<'_, '_>> = params.iter().map(TextParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            wrapped.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        self.client
            .execute(sql, &refs)
            .await
            .map_err(|e| query_error(e, sql))
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| query_error(e, sql))?;

        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let values = (0..row.len())
                    .map(|i| match row.get(i) {
                        Some(text) => SqlValue::Text(Cow::Owned(text.to_string())),
                        None => SqlValue::Null,
                    })
                    .collect();
                rows.push(Row::new(values));
            }
        }
        Ok(rows)
    }

    async fn column_names(&mut self, sql: &str) -> Result<Vec<String>> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| query_error(e, sql))?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn close(self: Box<Self>) {
        // Dropping the client ends the spawned connection task.
        drop(self);
    }
}

/// A parameter sent in text format, leaving type resolution to the server.
#[derive(Debug)]
struct TextParam<'a, 'b>(&'a SqlValue<'b>);

impl ToSql for TextParam<'_, '_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self.0 {
            SqlValue::Null => return Ok(IsNull::Yes),
            SqlValue::Bytes(bytes) => {
                out.extend_from_slice(b"\\x");
                out.extend_from_slice(hex::encode(bytes).as_bytes());
            }
            other => {
                if let Some(text) = other.as_text() {
                    out.extend_from_slice(text.as_bytes());
                }
            }
        }
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    tokio_postgres::types::to_sql_checked!();
}
