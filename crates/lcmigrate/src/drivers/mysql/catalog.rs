//! MySQL/MariaDB catalog queries.
//!
//! Everything is scoped to `DATABASE()`, the schema the session connected to.

use async_trait::async_trait;
use tracing::debug;

use super::dialect::MysqlDialect;
use crate::core::schema::{
    DatabaseAnalytics, DatabaseInfo, DatabaseObjects, ForeignKeyDef, ForeignKeyStat, IndexDef,
    IndexStat, TableSchema, TableStat, ViewDef,
};
use crate::core::traits::{Catalog, Connection, Dialect};
use crate::core::value::Row;
use crate::drivers::common::fetch_one;
use crate::error::{MigrateError, Result};
use crate::format::format_bytes;
use crate::schema::{
    build_add_foreign_key_sql, build_create_index_sql, extract_view_dependencies, split_column_list,
};

const TABLE_NAMES_SQL: &str = "SELECT table_name \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const VIEW_NAMES_SQL: &str = "SELECT table_name \
     FROM information_schema.views \
     WHERE table_schema = DATABASE() \
     ORDER BY table_name";

const TABLE_TOTALS_SQL: &str = "SELECT COUNT(*), COALESCE(SUM(data_length + index_length), 0) \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'";

const VIEW_COUNT_SQL: &str = "SELECT COUNT(*) \
     FROM information_schema.views \
     WHERE table_schema = DATABASE()";

const SETTINGS_SQL: &str = "SHOW VARIABLES WHERE Variable_name IN \
     ('version_comment', 'max_connections', 'wait_timeout', 'character_set_server', \
     'collation_server', 'innodb_buffer_pool_size')";

const UPTIME_SQL: &str = "SELECT VARIABLE_VALUE FROM performance_schema.global_status \
     WHERE VARIABLE_NAME = 'Uptime'";

const TABLE_STATS_SQL: &str = "SELECT table_name, engine, table_rows, data_length + index_length \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const INDEX_STATS_SQL: &str = "SELECT table_name, index_name, \
     GROUP_CONCAT(column_name ORDER BY seq_in_index), non_unique \
     FROM information_schema.statistics \
     WHERE table_schema = DATABASE() \
     GROUP BY table_name, index_name, non_unique \
     ORDER BY table_name, index_name";

const FOREIGN_KEY_STATS_SQL: &str = "SELECT table_name, column_name, constraint_name, \
     referenced_table_name, referenced_column_name \
     FROM information_schema.key_column_usage \
     WHERE table_schema = DATABASE() AND referenced_table_name IS NOT NULL \
     ORDER BY table_name, constraint_name";

const CONNECTION_STATS_SQL: &str = "SHOW STATUS WHERE Variable_name IN \
     ('Threads_connected', 'Max_used_connections', 'Connections', 'Aborted_connects')";

/// Catalog reader for MySQL and MariaDB.
#[derive(Debug, Clone, Default)]
pub struct MysqlCatalog {
    dialect: MysqlDialect,
}

impl MysqlCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    async fn indexes(&self, conn: &mut dyn Connection, table: &str) -> Result<Vec<IndexDef>> {
        let sql = format!(
            "SELECT index_name, GROUP_CONCAT(column_name ORDER BY seq_in_index), non_unique \
             FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND table_name = {} AND index_name != 'PRIMARY' \
             GROUP BY index_name, non_unique \
             ORDER BY index_name",
            self.dialect.quote_literal(table)
        );

        let mut indexes = Vec::new();
        for row in conn.query(&sql).await? {
            let mut index = IndexDef {
                name: row.get_string(0)?,
                columns: split_column_list(&row.get_string(1)?),
                is_unique: row.get_i64(2)? == 0,
                create_statement: String::new(),
            };
            index.create_statement = build_create_index_sql(&self.dialect, table, &index);
            indexes.push(index);
        }
        Ok(indexes)
    }

    async fn foreign_keys(
        &self,
        conn: &mut dyn Connection,
        table: &str,
    ) -> Result<Vec<ForeignKeyDef>> {
        let sql = format!(
            "SELECT kcu.constraint_name, \
                 GROUP_CONCAT(kcu.column_name ORDER BY kcu.ordinal_position), \
                 kcu.referenced_table_name, \
                 GROUP_CONCAT(kcu.referenced_column_name ORDER BY kcu.ordinal_position), \
                 rc.delete_rule, rc.update_rule \
             FROM information_schema.key_column_usage kcu \
             JOIN information_schema.referential_constraints rc \
                 ON kcu.constraint_name = rc.constraint_name \
                 AND kcu.table_schema = rc.constraint_schema \
             WHERE kcu.table_schema = DATABASE() \
                 AND kcu.table_name = {} \
                 AND kcu.referenced_table_name IS NOT NULL \
             GROUP BY kcu.constraint_name, kcu.referenced_table_name, rc.delete_rule, rc.update_rule \
             ORDER BY kcu.constraint_name",
            self.dialect.quote_literal(table)
        );

        let mut foreign_keys = Vec::new();
        for row in conn.query(&sql).await? {
            let mut fk = ForeignKeyDef {
                name: row.get_string(0)?,
                columns: split_column_list(&row.get_string(1)?),
                ref_table: row.get_string(2)?,
                ref_columns: split_column_list(&row.get_string(3)?),
                on_delete: row.get_opt_string(4).unwrap_or_default(),
                on_update: row.get_opt_string(5).unwrap_or_default(),
                create_statement: String::new(),
            };
            fk.create_statement = build_add_foreign_key_sql(&self.dialect, table, &fk);
            foreign_keys.push(fk);
        }
        Ok(foreign_keys)
    }

    async fn names(conn: &mut dyn Connection, sql: &str) -> Result<Vec<String>> {
        conn.query(sql)
            .await?
            .iter()
            .map(|row| row.get_string(0))
            .collect()
    }
}

/// (display label, value) for one `SHOW VARIABLES` row.
fn setting_label(name: &str, value: String) -> (String, String) {
    match name {
        "version_comment" => ("Server Type".into(), value),
        "max_connections" => ("Max Connections".into(), value),
        "wait_timeout" => ("Wait Timeout".into(), format!("{}s", value)),
        "character_set_server" => ("Character Set".into(), value),
        "collation_server" => ("Collation".into(), value),
        "innodb_buffer_pool_size" => {
            let shown = value
                .parse::<u64>()
                .map(format_bytes)
                .unwrap_or(value);
            ("InnoDB Buffer Pool".into(), shown)
        }
        other => (other.to_string(), value),
    }
}

fn unsigned(row: &Row, idx: usize) -> u64 {
    row.get(idx)
        .and_then(|v| v.as_i64())
        .map_or(0, |v| v.max(0) as u64)
}

#[async_trait]
impl Catalog for MysqlCatalog {
    async fn database_info(
        &self,
        conn: &mut dyn Connection,
        _database: &str,
    ) -> Result<DatabaseInfo> {
        let version = fetch_one(conn, "SELECT VERSION()").await?.get_string(0)?;
        let totals = fetch_one(conn, TABLE_TOTALS_SQL).await?;
        let view_count = fetch_one(conn, VIEW_COUNT_SQL).await?;
        let tables = self.table_names(conn).await?;

        Ok(DatabaseInfo {
            version,
            major_version: 0,
            table_count: unsigned(&totals, 0),
            view_count: unsigned(&view_count, 0),
            total_size: unsigned(&totals, 1),
            tables,
        })
    }

    async fn table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        Self::names(conn, TABLE_NAMES_SQL).await
    }

    async fn table_schema(&self, conn: &mut dyn Connection, table: &str) -> Result<TableSchema> {
        let sql = format!("SHOW CREATE TABLE {}", self.dialect.quote_ident(table));
        let create_statement = fetch_one(conn, &sql)
            .await
            .and_then(|row| row.get_string(1))
            .map_err(|e| MigrateError::extraction(format!("table {}", table), e))?;

        let indexes = self.indexes(conn, table).await?;
        let foreign_keys = self.foreign_keys(conn, table).await?;

        debug!(
            "Extracted {}: {} indexes, {} foreign keys",
            table,
            indexes.len(),
            foreign_keys.len()
        );

        Ok(TableSchema {
            name: table.to_string(),
            create_statement,
            indexes,
            foreign_keys,
        })
    }

    async fn views(&self, conn: &mut dyn Connection) -> Result<Vec<ViewDef>> {
        let rows = conn
            .query(
                "SELECT table_name, view_definition \
                 FROM information_schema.views \
                 WHERE table_schema = DATABASE() \
                 ORDER BY table_name",
            )
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get_string(0)?;
            let definition = row.get_opt_string(1).unwrap_or_default();

            let sql = format!("SHOW CREATE VIEW {}", self.dialect.quote_ident(&name));
            let create_statement = fetch_one(conn, &sql)
                .await
                .and_then(|r| r.get_string(1))
                .map_err(|e| MigrateError::extraction(format!("view {}", name), e))?;

            views.push(ViewDef {
                dependencies: extract_view_dependencies(&definition),
                name,
                create_statement,
            });
        }
        Ok(views)
    }

    async fn objects(&self, conn: &mut dyn Connection) -> Result<DatabaseObjects> {
        Ok(DatabaseObjects {
            tables: Self::names(conn, TABLE_NAMES_SQL).await?,
            views: Self::names(conn, VIEW_NAMES_SQL).await?,
            sequences: Vec::new(),
        })
    }

    async fn analyze(
        &self,
        conn: &mut dyn Connection,
        database: &str,
    ) -> Result<DatabaseAnalytics> {
        let version = fetch_one(conn, "SELECT VERSION()").await?.get_string(0)?;

        let settings = conn
            .query(SETTINGS_SQL)
            .await?
            .into_iter()
            .filter_map(|row| Some(setting_label(&row.get_string(0).ok()?, row.get_opt_string(1)?)))
            .collect();

        // performance_schema may be disabled; uptime is optional.
        let uptime_seconds = match fetch_one(conn, UPTIME_SQL).await {
            Ok(row) => row.get_i64(0).ok().map(|v| v.max(0) as u64),
            Err(e) => {
                debug!("Uptime unavailable: {}", e);
                None
            }
        };

        let totals = fetch_one(conn, TABLE_TOTALS_SQL).await?;

        let tables = conn
            .query(TABLE_STATS_SQL)
            .await?
            .iter()
            .map(|row| {
                Ok(TableStat {
                    name: row.get_string(0)?,
                    engine: row.get_opt_string(1),
                    estimated_rows: unsigned(row, 2),
                    size: unsigned(row, 3),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let indexes = conn
            .query(INDEX_STATS_SQL)
            .await?
            .iter()
            .map(|row| {
                Ok(IndexStat {
                    table: row.get_string(0)?,
                    name: row.get_string(1)?,
                    columns: row.get_opt_string(2),
                    is_unique: row.get_i64(3)? == 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let foreign_keys = conn
            .query(FOREIGN_KEY_STATS_SQL)
            .await?
            .iter()
            .map(|row| {
                Ok(ForeignKeyStat {
                    table: row.get_string(0)?,
                    column: row.get_string(1)?,
                    constraint: row.get_string(2)?,
                    ref_table: row.get_string(3)?,
                    ref_column: row.get_string(4)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let connections = conn
            .query(CONNECTION_STATS_SQL)
            .await?
            .iter()
            .filter_map(|row| Some((row.get_string(0).ok()?, row.get_opt_string(1)?)))
            .collect();

        Ok(DatabaseAnalytics {
            engine: self.dialect.name().to_string(),
            database: database.to_string(),
            version,
            settings,
            uptime_seconds,
            table_count: unsigned(&totals, 0),
            total_size: unsigned(&totals, 1),
            tables,
            indexes,
            foreign_keys,
            connections,
        })
    }
}
