//! Executes extracted definitions against the destination.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::core::schema::{ForeignKeyDef, IndexDef, SequenceDef, TableSchema, ViewDef};
use crate::core::traits::{Connection, Dialect};
use crate::drivers::common::message_matches;
use crate::error::{MigrateError, Result};

// Optional CONSTRAINT name, FOREIGN KEY (cols) REFERENCES t (cols), then any
// ON DELETE/ON UPDATE/MATCH clauses.
static FOREIGN_KEY_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i),?\s*(?:CONSTRAINT\s+(?:`[^`]*`|"[^"]*"|\w+)\s+)?"#,
        r#"FOREIGN\s+KEY\s*(?:(?:`[^`]*`|"[^"]*"|\w+)\s*)?\([^)]*\)\s*"#,
        r#"REFERENCES\s+(?:`[^`]*`|"[^"]*"|[\w.]+)\s*\([^)]*\)"#,
        r#"(?:\s+(?:ON\s+(?:DELETE|UPDATE)\s+(?:SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION|RESTRICT|CASCADE)|MATCH\s+\w+))*"#,
    ))
    .expect("valid foreign key clause regex")
});

/// Remove inline foreign key clauses from a CREATE TABLE statement.
///
/// Foreign keys are added after the data is loaded, so tables can be created
/// in any order.
pub fn strip_foreign_keys(create_statement: &str) -> String {
    FOREIGN_KEY_CLAUSE_RE
        .replace_all(create_statement, "")
        .into_owned()
}

/// Applies schema objects over one destination session.
pub struct SchemaApplier<'a> {
    conn: &'a mut dyn Connection,
    dialect: &'a dyn Dialect,
}

impl<'a> SchemaApplier<'a> {
    pub fn new(conn: &'a mut dyn Connection, dialect: &'a dyn Dialect) -> Self {
        Self { conn, dialect }
    }

    async fn run(&mut self, object: String, sql: &str) -> Result<()> {
        debug!("Executing DDL for {}: {}", object, sql);
        self.conn
            .execute(sql)
            .await
            .map_err(|e| MigrateError::apply(object, e))?;
        Ok(())
    }

    /// Create a table without its foreign keys.
    pub async fn create_table(&mut self, table: &TableSchema) -> Result<()> {
        let sql = strip_foreign_keys(&table.create_statement);
        self.run(format!("table {}", table.name), &sql).await?;
        info!("Created table {}", table.name);
        Ok(())
    }

    /// Create a secondary index.
    ///
    /// MySQL's SHOW CREATE TABLE already declares its keys, so an index that
    /// exists by name is skipped.
    pub async fn create_index(&mut self, table: &str, index: &IndexDef) -> Result<()> {
        debug!("Creating index {} on {}", index.name, table);
        match self.conn.execute(&index.create_statement).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_index(&e) => {
                debug!("Index {} on {} already exists", index.name, table);
                Ok(())
            }
            Err(e) => Err(MigrateError::apply(
                format!("index {} on {}", index.name, table),
                e,
            )),
        }
    }

    pub async fn create_foreign_key(&mut self, table: &str, fk: &ForeignKeyDef) -> Result<()> {
        self.run(
            format!("foreign key {} on {}", fk.name, table),
            &fk.create_statement,
        )
        .await
    }

    pub async fn create_view(&mut self, view: &ViewDef) -> Result<()> {
        self.run(format!("view {}", view.name), &view.create_statement)
            .await?;
        info!("Created view {}", view.name);
        Ok(())
    }

    /// Bring a sequence to its source value.
    ///
    /// Sequences owned by a column already exist once the table does; free
    /// standing ones are created first. A no-op for engines without
    /// sequences.
    pub async fn apply_sequence(&mut self, sequence: &SequenceDef) -> Result<()> {
        let Some(sql) = self
            .dialect
            .set_sequence_value_sql(&sequence.name, sequence.current_value)
        else {
            return Ok(());
        };

        let object = format!("sequence {}", sequence.name);
        if sequence.owner_table.is_none() {
            self.run(object.clone(), &sequence.create_statement).await?;
        }
        self.run(object, &sql).await?;
        debug!("Sequence {} set to {}", sequence.name, sequence.current_value);
        Ok(())
    }
}

fn is_duplicate_index(err: &MigrateError) -> bool {
    message_matches(&err.to_string(), &["duplicate key name", "already exists"])
}
