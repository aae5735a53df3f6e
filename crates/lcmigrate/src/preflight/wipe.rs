//! Dropping every object in a destination database.

use tracing::{debug, info, warn};

use crate::core::schema::DatabaseObjects;
use crate::core::traits::{Connection, Dialect};
use crate::drivers::Database;
use crate::error::{MigrateError, Result};

/// Drop all views, base tables and sequences of `db`.
///
/// Engines without DROP ... CASCADE get foreign key checks suspended for the
/// duration of the drops.
pub async fn wipe_database(db: &mut Database) -> Result<DatabaseObjects> {
    let objects = db.catalog.objects(db.conn.as_mut()).await?;
    let dialect = &db.dialect;
    let conn = db.conn.as_mut();

    let suspend_checks = !dialect.supports_drop_cascade();
    if suspend_checks {
        conn.execute(dialect.disable_fk_checks_sql()).await?;
    }

    let dropped = drop_all(conn, dialect, &objects).await;

    // Runs even when a drop failed.
    if suspend_checks {
        if let Err(e) = conn.execute(dialect.enable_fk_checks_sql()).await {
            if dropped.is_ok() {
                return Err(e);
            }
            warn!("Could not re-enable foreign key checks: {}", e);
        }
    }
    dropped?;

    info!(
        "Wiped {}: {} tables, {} views, {} sequences",
        db.database,
        objects.tables.len(),
        objects.views.len(),
        objects.sequences.len()
    );
    Ok(objects)
}

async fn drop_all(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    objects: &DatabaseObjects,
) -> Result<()> {
    for view in &objects.views {
        drop_object(conn, dialect, "VIEW", view).await?;
    }
    for table in &objects.tables {
        drop_object(conn, dialect, "TABLE", table).await?;
    }
    if dialect.supports_sequences() {
        for sequence in &objects.sequences {
            drop_object(conn, dialect, "SEQUENCE", sequence).await?;
        }
    }
    Ok(())
}

async fn drop_object(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    kind: &str,
    name: &str,
) -> Result<()> {
    let sql = format!(
        "DROP {} IF EXISTS {}{}",
        kind,
        dialect.quote_ident(name),
        if dialect.supports_drop_cascade() { " CASCADE" } else { "" }
    );
    debug!("{}", sql);
    conn.execute(&sql).await.map_err(|e| {
        MigrateError::query(e, format!("dropping {} {}", kind.to_lowercase(), name))
    })?;
    Ok(())
}
