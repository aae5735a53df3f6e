//! PostgreSQL catalog queries against the `public` schema.
//!
//! PostgreSQL has no `SHOW CREATE TABLE`, so table DDL is rebuilt from
//! `pg_attribute` and the primary-key index.

use async_trait::async_trait;
use tracing::debug;

use super::dialect::PostgresDialect;
use crate::core::schema::{
    DatabaseAnalytics, DatabaseInfo, DatabaseObjects, ForeignKeyDef, ForeignKeyStat, IndexDef,
    IndexStat, SequenceDef, TableSchema, TableStat, ViewDef,
};
use crate::core::traits::{Catalog, Connection, Dialect};
use crate::core::value::Row;
use crate::drivers::common::fetch_one;
use crate::error::{MigrateError, Result};
use crate::schema::{build_add_foreign_key_sql, extract_view_dependencies, split_column_list};

const TABLE_NAMES_SQL: &str = "SELECT table_name \
     FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const TABLE_COUNT_SQL: &str = "SELECT COUNT(*) \
     FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE'";

const VIEW_COUNT_SQL: &str = "SELECT COUNT(*) \
     FROM information_schema.views \
     WHERE table_schema = 'public'";

const DATABASE_SIZE_SQL: &str = "SELECT pg_database_size(current_database())";

const VIEWS_SQL: &str = "SELECT viewname, \
     pg_get_viewdef(format('%I.%I', schemaname, viewname)::regclass, true) \
     FROM pg_views \
     WHERE schemaname = 'public' \
     ORDER BY viewname";

const SEQUENCES_SQL: &str = "SELECT s.sequencename, d.refobjid::regclass::text, a.attname, \
     COALESCE(s.last_value, 1) \
     FROM pg_sequences s \
     LEFT JOIN pg_depend d \
         ON d.objid = format('%I.%I', s.schemaname, s.sequencename)::regclass \
         AND d.deptype IN ('a', 'i') \
         AND d.classid = 'pg_class'::regclass \
         AND d.refclassid = 'pg_class'::regclass \
     LEFT JOIN pg_attribute a ON a.attrelid = d.refobjid AND a.attnum = d.refobjsubid \
     WHERE s.schemaname = 'public' \
     ORDER BY s.sequencename";

const WIPE_TABLES_SQL: &str =
    "SELECT tablename FROM pg_tables WHERE schemaname = 'public' ORDER BY tablename";
const WIPE_VIEWS_SQL: &str =
    "SELECT viewname FROM pg_views WHERE schemaname = 'public' ORDER BY viewname";
const WIPE_SEQUENCES_SQL: &str =
    "SELECT sequencename FROM pg_sequences WHERE schemaname = 'public' ORDER BY sequencename";

const UPTIME_SQL: &str = "SELECT EXTRACT(EPOCH FROM (now() - pg_postmaster_start_time()))";

const TABLE_STATS_SQL: &str = "SELECT t.table_name, COALESCE(s.n_live_tup, 0), \
     pg_total_relation_size(quote_ident(t.table_name)::regclass) \
     FROM information_schema.tables t \
     LEFT JOIN pg_stat_user_tables s ON t.table_name = s.relname AND s.schemaname = 'public' \
     WHERE t.table_schema = 'public' AND t.table_type = 'BASE TABLE' \
     ORDER BY t.table_name";

const INDEX_STATS_SQL: &str = "SELECT tablename, indexname, indexdef LIKE 'CREATE UNIQUE%' \
     FROM pg_indexes \
     WHERE schemaname = 'public' \
     ORDER BY tablename, indexname";

const FOREIGN_KEY_STATS_SQL: &str = "SELECT tc.table_name, kcu.column_name, tc.constraint_name, \
     ccu.table_name, ccu.column_name \
     FROM information_schema.table_constraints AS tc \
     JOIN information_schema.key_column_usage AS kcu \
         ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     JOIN information_schema.constraint_column_usage AS ccu \
         ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
     WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public' \
     ORDER BY tc.table_name, tc.constraint_name";

/// Server settings shown by `analyze`, as (SHOW name, label).
const SETTINGS: [(&str, &str); 5] = [
    ("max_connections", "Max Connections"),
    ("shared_buffers", "Shared Buffers"),
    ("work_mem", "Work Mem"),
    ("server_encoding", "Encoding"),
    ("timezone", "Timezone"),
];

/// Connection counters shown by `analyze`, as (label, query).
const CONNECTION_STATS: [(&str, &str); 3] = [
    (
        "Active",
        "SELECT COUNT(*) FROM pg_stat_activity WHERE state = 'active'",
    ),
    (
        "Idle",
        "SELECT COUNT(*) FROM pg_stat_activity WHERE state = 'idle'",
    ),
    ("Total", "SELECT COUNT(*) FROM pg_stat_activity"),
];

/// Catalog reader for PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct PostgresCatalog {
    dialect: PostgresDialect,
}

impl PostgresCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `'"name"'::regclass`, safe for mixed-case names.
    fn regclass(&self, table: &str) -> String {
        format!(
            "{}::regclass",
            self.dialect.quote_literal(&self.dialect.quote_ident(table))
        )
    }

    /// Rebuild `CREATE TABLE` from the catalog.
    ///
    /// Integer columns defaulting to `nextval(...)` become SERIAL types and
    /// drop the default. Identity columns keep their identity without a
    /// DEFAULT clause.
    async fn build_create_table(&self, conn: &mut dyn Connection, table: &str) -> Result<String> {
        let columns_sql = format!(
            "SELECT a.attname, \
                 pg_catalog.format_type(a.atttypid, a.atttypmod), \
                 COALESCE(pg_get_expr(d.adbin, d.adrelid), ''), \
                 a.attnotnull, \
                 a.attidentity != '' \
             FROM pg_catalog.pg_attribute a \
             LEFT JOIN pg_catalog.pg_attrdef d ON (a.attrelid, a.attnum) = (d.adrelid, d.adnum) \
             WHERE a.attrelid = {} AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
            self.regclass(table)
        );

        let mut columns = Vec::new();
        for row in conn.query(&columns_sql).await? {
            columns.push(self.parse_column(&row)?);
        }

        let pk_sql = format!(
            "SELECT string_agg(quote_ident(a.attname), ', ' ORDER BY array_position(i.indkey, a.attnum)) \
             FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = {} AND i.indisprimary",
            self.regclass(table)
        );
        let pk_columns = conn
            .query(&pk_sql)
            .await?
            .first()
            .and_then(|row| row.get_opt_string(0))
            .unwrap_or_default();

        Ok(assemble_create_table(
            &self.dialect.quote_ident(table),
            &columns,
            &pk_columns,
        ))
    }

    fn parse_column(&self, row: &Row) -> Result<String> {
        let name = row.get_string(0)?;
        let data_type = row.get_string(1)?;
        let default = row.get_opt_string(2).unwrap_or_default();
        let not_null = row.get_bool(3)?;
        let is_identity = row.get_bool(4)?;
        Ok(column_definition(
            &self.dialect.quote_ident(&name),
            data_type,
            default,
            not_null,
            is_identity,
        ))
    }

    async fn indexes(&self, conn: &mut dyn Connection, table: &str) -> Result<Vec<IndexDef>> {
        let sql = format!(
            "SELECT i.relname, \
                 array_to_string(array_agg(a.attname ORDER BY k.n), ','), \
                 ix.indisunique, \
                 pg_get_indexdef(ix.indexrelid) \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, n) ON true \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
             WHERE t.relname = {} AND n.nspname = 'public' AND NOT ix.indisprimary \
             GROUP BY i.relname, ix.indisunique, ix.indexrelid \
             ORDER BY i.relname",
            self.dialect.quote_literal(table)
        );

        conn.query(&sql)
            .await?
            .iter()
            .map(|row| {
                Ok(IndexDef {
                    name: row.get_string(0)?,
                    columns: split_column_list(&row.get_string(1)?),
                    is_unique: row.get_bool(2)?,
                    create_statement: row.get_string(3)?,
                })
            })
            .collect()
    }

    async fn foreign_keys(
        &self,
        conn: &mut dyn Connection,
        table: &str,
    ) -> Result<Vec<ForeignKeyDef>> {
        let sql = format!(
            "SELECT c.conname, \
                 (SELECT string_agg(a.attname, ',' ORDER BY k.n) \
                  FROM unnest(c.conkey) WITH ORDINALITY AS k(attnum, n) \
                  JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum), \
                 rt.relname, \
                 (SELECT string_agg(a.attname, ',' ORDER BY k.n) \
                  FROM unnest(c.confkey) WITH ORDINALITY AS k(attnum, n) \
                  JOIN pg_attribute a ON a.attrelid = c.confrelid AND a.attnum = k.attnum), \
                 {}, {} \
             FROM pg_constraint c \
             JOIN pg_class t ON t.oid = c.conrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN pg_class rt ON rt.oid = c.confrelid \
             WHERE c.contype = 'f' AND n.nspname = 'public' AND t.relname = {} \
             ORDER BY c.conname",
            referential_action("c.confdeltype"),
            referential_action("c.confupdtype"),
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

    async fn count(conn: &mut dyn Connection, sql: &str) -> Result<u64> {
        let row = fetch_one(conn, sql).await?;
        Ok(row.get_i64(0)?.max(0) as u64)
    }
}

/// SQL CASE mapping a `pg_constraint` action code to its keyword.
fn referential_action(column: &str) -> String {
    format!(
        "CASE {} WHEN 'a' THEN 'NO ACTION' WHEN 'r' THEN 'RESTRICT' WHEN 'c' THEN 'CASCADE' \
         WHEN 'n' THEN 'SET NULL' WHEN 'd' THEN 'SET DEFAULT' END",
        column
    )
}

fn column_definition(
    quoted_name: &str,
    mut data_type: String,
    mut default: String,
    not_null: bool,
    is_identity: bool,
) -> String {
    if default.contains("nextval(") {
        let serial = match data_type.as_str() {
            "bigint" => Some("BIGSERIAL"),
            "integer" => Some("SERIAL"),
            "smallint" => Some("SMALLSERIAL"),
            _ => None,
        };
        if let Some(serial) = serial {
            data_type = serial.to_string();
            default.clear();
        }
    }

    let mut definition = format!("    {} {}", quoted_name, data_type);
    if is_identity {
        definition.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    } else if !default.is_empty() {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default);
    }
    if not_null && !data_type.contains("SERIAL") {
        definition.push_str(" NOT NULL");
    }
    definition
}

fn assemble_create_table(quoted_table: &str, columns: &[String], pk_columns: &str) -> String {
    let pk_clause = if pk_columns.is_empty() {
        String::new()
    } else {
        format!(",\n    PRIMARY KEY ({})", pk_columns)
    };
    format!(
        "CREATE TABLE {} (\n{}{}\n)",
        quoted_table,
        columns.join(",\n"),
        pk_clause
    )
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn database_info(
        &self,
        conn: &mut dyn Connection,
        _database: &str,
    ) -> Result<DatabaseInfo> {
        let version = fetch_one(conn, "SELECT version()").await?.get_string(0)?;
        let table_count = Self::count(conn, TABLE_COUNT_SQL).await?;
        let total_size = Self::count(conn, DATABASE_SIZE_SQL).await?;
        let view_count = Self::count(conn, VIEW_COUNT_SQL).await?;
        let tables = self.table_names(conn).await?;

        Ok(DatabaseInfo {
            version,
            major_version: 0,
            table_count,
            view_count,
            total_size,
            tables,
        })
    }

    async fn table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        Self::names(conn, TABLE_NAMES_SQL).await
    }

    async fn table_schema(&self, conn: &mut dyn Connection, table: &str) -> Result<TableSchema> {
        let create_statement = self.build_create_table(conn, table).await?;
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
        conn.query(VIEWS_SQL)
            .await?
            .iter()
            .map(|row| {
                let name = row.get_string(0)?;
                let definition = row.get_opt_string(1).ok_or_else(|| {
                    MigrateError::extraction(format!("view {}", name), "definition is NULL")
                })?;
                Ok(ViewDef {
                    create_statement: format!(
                        "CREATE VIEW {} AS\n{}",
                        self.dialect.quote_ident(&name),
                        definition
                    ),
                    dependencies: extract_view_dependencies(&definition),
                    name,
                })
            })
            .collect()
    }

    async fn sequences(&self, conn: &mut dyn Connection) -> Result<Vec<SequenceDef>> {
        conn.query(SEQUENCES_SQL)
            .await?
            .iter()
            .map(|row| {
                let name = row.get_string(0)?;
                Ok(SequenceDef {
                    create_statement: format!(
                        "CREATE SEQUENCE {}",
                        self.dialect.quote_ident(&name)
                    ),
                    owner_table: row.get_opt_string(1),
                    owner_column: row.get_opt_string(2),
                    current_value: row.get_i64(3)?,
                    name,
                })
            })
            .collect()
    }

    async fn objects(&self, conn: &mut dyn Connection) -> Result<DatabaseObjects> {
        Ok(DatabaseObjects {
            tables: Self::names(conn, WIPE_TABLES_SQL).await?,
            views: Self::names(conn, WIPE_VIEWS_SQL).await?,
            sequences: Self::names(conn, WIPE_SEQUENCES_SQL).await?,
        })
    }

    async fn analyze(
        &self,
        conn: &mut dyn Connection,
        database: &str,
    ) -> Result<DatabaseAnalytics> {
        let version = fetch_one(conn, "SELECT version()").await?.get_string(0)?;

        let mut settings = Vec::new();
        for (name, label) in SETTINGS {
            match fetch_one(conn, &format!("SHOW {}", name)).await {
                Ok(row) => {
                    if let Some(value) = row.get_opt_string(0) {
                        settings.push((label.to_string(), value));
                    }
                }
                Err(e) => debug!("Setting {} unavailable: {}", name, e),
            }
        }

        let uptime_seconds = match fetch_one(conn, UPTIME_SQL).await {
            Ok(row) => row.get_i64(0).ok().map(|v| v.max(0) as u64),
            Err(e) => {
                debug!("Uptime unavailable: {}", e);
                None
            }
        };

        let table_count = Self::count(conn, TABLE_COUNT_SQL).await?;
        let total_size = Self::count(conn, DATABASE_SIZE_SQL).await?;

        let tables = conn
            .query(TABLE_STATS_SQL)
            .await?
            .iter()
            .map(|row| {
                Ok(TableStat {
                    name: row.get_string(0)?,
                    engine: None,
                    estimated_rows: row.get_i64(1)?.max(0) as u64,
                    size: row.get_i64(2)?.max(0) as u64,
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
                    columns: None,
                    is_unique: row.get_bool(2)?,
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

        let mut connections = Vec::new();
        for (label, sql) in CONNECTION_STATS {
            let count = Self::count(conn, sql).await?;
            connections.push((label.to_string(), count.to_string()));
        }

        Ok(DatabaseAnalytics {
            engine: self.dialect.name().to_string(),
            database: database.to_string(),
            version,
            settings,
            uptime_seconds,
            table_count,
            total_size,
            tables,
            indexes,
            foreign_keys,
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::testing::MockConnection;

    fn text(s: &str) -> SqlValue<'static> {
        SqlValue::Text(s.to_string().into())
    }

    #[test]
    fn test_serial_column_loses_default() {
        let def = column_definition(
            "\"id\"",
            "integer".into(),
            "nextval('users_id_seq'::regclass)".into(),
            true,
            false,
        );
        assert_eq!(def, "    \"id\" SERIAL");

        let def = column_definition(
            "\"big\"",
            "bigint".into(),
            "nextval('big_seq'::regclass)".into(),
            true,
            false,
        );
        assert_eq!(def, "    \"big\" BIGSERIAL");
    }

    #[test]
    fn test_plain_column_keeps_default_and_not_null() {
        let def = column_definition(
            "\"status\"",
            "character varying(20)".into(),
            "'new'::character varying".into(),
            true,
            false,
        );
        assert_eq!(
            def,
            "    \"status\" character varying(20) DEFAULT 'new'::character varying NOT NULL"
        );
    }

    #[test]
    fn test_identity_column_omits_default() {
        let def = column_definition("\"id\"", "bigint".into(), String::new(), true, true);
        assert_eq!(def, "    \"id\" bigint GENERATED BY DEFAULT AS IDENTITY NOT NULL");
    }

    #[test]
    fn test_assemble_create_table() {
        let columns = vec![
            "    \"id\" SERIAL".to_string(),
            "    \"name\" text NOT NULL".to_string(),
        ];
        assert_eq!(
            assemble_create_table("\"users\"", &columns, "id"),
            "CREATE TABLE \"users\" (\n    \"id\" SERIAL,\n    \"name\" text NOT NULL,\n    PRIMARY KEY (id)\n)"
        );
        assert_eq!(
            assemble_create_table("\"log\"", &columns[1..], ""),
            "CREATE TABLE \"log\" (\n    \"name\" text NOT NULL\n)"
        );
    }

    #[tokio::test]
    async fn test_views_build_create_statement() {
        let mut conn = MockConnection::new().with_result(
            "FROM pg_views",
            vec![Row::new(vec![
                text("active_users"),
                text(" SELECT users.id\n   FROM users\n  WHERE users.active;"),
            ])],
        );

        let views = PostgresCatalog::new().views(&mut conn).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0]
            .create_statement
            .starts_with("CREATE VIEW \"active_users\" AS\n SELECT"));
        assert_eq!(views[0].dependencies, vec!["users"]);
    }

    #[tokio::test]
    async fn test_sequences_read_owner_and_value() {
        let mut conn = MockConnection::new().with_result(
            "FROM pg_sequences s",
            vec![
                Row::new(vec![text("users_id_seq"), text("users"), text("id"), text("42")]),
                Row::new(vec![text("free_seq"), SqlValue::Null, SqlValue::Null, text("1")]),
            ],
        );

        let sequences = PostgresCatalog::new().sequences(&mut conn).await.unwrap();
        assert_eq!(sequences[0].current_value, 42);
        assert_eq!(sequences[0].owner_table.as_deref(), Some("users"));
        assert_eq!(sequences[0].owner_column.as_deref(), Some("id"));
        assert_eq!(sequences[1].owner_table, None);
        assert_eq!(sequences[1].create_statement, "CREATE SEQUENCE \"free_seq\"");
    }

    #[tokio::test]
    async fn test_foreign_keys_omit_default_action() {
        let mut conn = MockConnection::new().with_result(
            "FROM pg_constraint c",
            vec![Row::new(vec![
                text("fk_order_customer"),
                text("customer_id"),
                text("customers"),
                text("id"),
                text("NO ACTION"),
                text("CASCADE"),
            ])],
        );

        let fks = PostgresCatalog::new()
            .foreign_keys(&mut conn, "orders")
            .await
            .unwrap();
        assert_eq!(
            fks[0].create_statement,
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"fk_order_customer\" FOREIGN KEY (\"customer_id\") \
             REFERENCES \"customers\" (\"id\") ON UPDATE CASCADE"
        );
    }
}
