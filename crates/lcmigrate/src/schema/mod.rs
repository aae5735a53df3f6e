//! Schema extraction and reconstruction.
//!
//! - Extraction reads definitions from the source catalog ([`extract_tables`],
//!   [`extract_views`], [`extract_sequences`])
//! - [`resolve_view_order`] orders views so dependencies come first
//! - [`SchemaApplier`] executes the definitions against the destination
//!
//! The statement builders here are shared by the engine catalogs so that
//! index and foreign key DDL has one shape across engines, differing only in
//! quoting and the engine's default referential action.

mod applier;
mod views;

pub use applier::{strip_foreign_keys, SchemaApplier};
pub use views::{extract_view_dependencies, resolve_view_order};

use tracing::{debug, info};

use crate::core::schema::{ForeignKeyDef, IndexDef, SequenceDef, TableSchema, ViewDef};
use crate::core::traits::{Catalog, Connection, Dialect};
use crate::error::{MigrateError, Result};

/// Extract every base table, sorted by name.
///
/// A failure on one table aborts the extraction with the table's name
/// attached.
pub async fn extract_tables(
    catalog: &dyn Catalog,
    conn: &mut dyn Connection,
) -> Result<Vec<TableSchema>> {
    let names = catalog
        .table_names(conn)
        .await
        .map_err(|e| MigrateError::extraction("table list", e))?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let table = catalog
            .table_schema(conn, &name)
            .await
            .map_err(|e| match e {
                MigrateError::Extraction { .. } => e,
                other => MigrateError::extraction(format!("table {}", name), other),
            })?;
        debug!("Extracted table {}", name);
        tables.push(table);
    }

    info!("Extracted {} tables", tables.len());
    Ok(tables)
}

/// Extract views in creation order.
pub async fn extract_views(
    catalog: &dyn Catalog,
    conn: &mut dyn Connection,
) -> Result<Vec<ViewDef>> {
    let views = catalog.views(conn).await.map_err(|e| match e {
        MigrateError::Extraction { .. } => e,
        other => MigrateError::extraction("views", other),
    })?;
    Ok(resolve_view_order(views))
}

/// Extract sequences; empty for engines without them.
pub async fn extract_sequences(
    catalog: &dyn Catalog,
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
) -> Result<Vec<SequenceDef>> {
    if !dialect.supports_sequences() {
        return Ok(Vec::new());
    }
    catalog
        .sequences(conn)
        .await
        .map_err(|e| MigrateError::extraction("sequences", e))
}

/// Split a comma-separated column list from a catalog aggregate.
pub fn split_column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

fn quote_columns(dialect: &dyn Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE [UNIQUE] INDEX` for a secondary index.
pub fn build_create_index_sql(dialect: &dyn Dialect, table: &str, index: &IndexDef) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.is_unique { "UNIQUE " } else { "" },
        dialect.quote_ident(&index.name),
        dialect.quote_ident(table),
        quote_columns(dialect, &index.columns)
    )
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
///
/// ON DELETE / ON UPDATE clauses equal to the engine's default action are
/// left out.
pub fn build_add_foreign_key_sql(dialect: &dyn Dialect, table: &str, fk: &ForeignKeyDef) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote_ident(table),
        dialect.quote_ident(&fk.name),
        quote_columns(dialect, &fk.columns),
        dialect.quote_ident(&fk.ref_table),
        quote_columns(dialect, &fk.ref_columns)
    );

    let default_action = dialect.default_fk_action();
    for (clause, action) in [("ON DELETE", &fk.on_delete), ("ON UPDATE", &fk.on_update)] {
        if !action.is_empty() && !action.eq_ignore_ascii_case(default_action) {
            sql.push(' ');
            sql.push_str(clause);
            sql.push(' ');
            sql.push_str(action);
        }
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MysqlDialect, PostgresDialect};
    use crate::testing::{MockCatalog, MockConnection};

    fn fk(on_delete: &str, on_update: &str) -> ForeignKeyDef {
        ForeignKeyDef {
            name: "fk_items_order".into(),
            columns: vec!["order_id".into(), "line".into()],
            ref_table: "orders".into(),
            ref_columns: vec!["id".into(), "line".into()],
            on_delete: on_delete.into(),
            on_update: on_update.into(),
            create_statement: String::new(),
        }
    }

    #[test]
    fn test_split_column_list() {
        assert_eq!(split_column_list("a,b, c"), vec!["a", "b", "c"]);
        assert!(split_column_list("").is_empty());
    }

    #[test]
    fn test_build_create_index_sql() {
        let index = IndexDef {
            name: "uq_email".into(),
            columns: vec!["email".into()],
            is_unique: true,
            create_statement: String::new(),
        };
        assert_eq!(
            build_create_index_sql(&PostgresDialect, "users", &index),
            "CREATE UNIQUE INDEX \"uq_email\" ON \"users\" (\"email\")"
        );
    }

    #[test]
    fn test_fk_sql_omits_engine_default_action() {
        let mysql = MysqlDialect;
        assert_eq!(
            build_add_foreign_key_sql(&mysql, "items", &fk("RESTRICT", "CASCADE")),
            "ALTER TABLE `items` ADD CONSTRAINT `fk_items_order` FOREIGN KEY (`order_id`, `line`) \
             REFERENCES `orders` (`id`, `line`) ON UPDATE CASCADE"
        );

        let pg = PostgresDialect;
        assert_eq!(
            build_add_foreign_key_sql(&pg, "items", &fk("SET NULL", "NO ACTION")),
            "ALTER TABLE \"items\" ADD CONSTRAINT \"fk_items_order\" FOREIGN KEY (\"order_id\", \"line\") \
             REFERENCES \"orders\" (\"id\", \"line\") ON DELETE SET NULL"
        );
    }

    #[tokio::test]
    async fn test_extract_tables_wraps_errors_with_table_name() {
        let catalog = MockCatalog::new()
            .with_table(TableSchema {
                name: "a".into(),
                create_statement: "CREATE TABLE a (id int)".into(),
                indexes: vec![],
                foreign_keys: vec![],
            })
            .with_failing_table("b");
        let mut conn = MockConnection::new();

        let err = extract_tables(&catalog, &mut conn).await.unwrap_err();
        assert!(matches!(err, MigrateError::Extraction { ref object, .. } if object == "table b"));
    }

    #[tokio::test]
    async fn test_extract_views_orders_dependencies() {
        let catalog = MockCatalog::new()
            .with_view("b", "CREATE VIEW b AS SELECT * FROM a", &["a"])
            .with_view("a", "CREATE VIEW a AS SELECT * FROM t", &["t"]);
        let mut conn = MockConnection::new();

        let views = extract_views(&catalog, &mut conn).await.unwrap();
        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_extract_sequences_skipped_without_support() {
        let catalog = MockCatalog::new().with_sequence("s", 10);
        let mut conn = MockConnection::new();

        let none = extract_sequences(&catalog, &mut conn, &MysqlDialect)
            .await
            .unwrap();
        assert!(none.is_empty());

        let some = extract_sequences(&catalog, &mut conn, &PostgresDialect)
            .await
            .unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].current_value, 10);
    }
}
