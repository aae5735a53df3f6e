//! Schema and catalog metadata types.
//!
//! Everything here is produced by a [`Catalog`](crate::core::traits::Catalog)
//! reading the source and consumed unchanged by the applier, so each
//! definition carries a ready-to-execute statement alongside its parsed parts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A base table and the DDL needed to recreate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Complete CREATE TABLE statement, possibly still containing FK clauses.
    pub create_statement: String,

    /// Secondary indexes (the primary key is part of `create_statement`).
    pub indexes: Vec<IndexDef>,

    /// Foreign keys, created after all data is loaded.
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// Secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    /// Columns in index order.
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub create_statement: String,
}

/// Foreign key definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    /// Local columns in ordinal order.
    pub columns: Vec<String>,
    pub ref_table: String,
    /// Referenced columns, parallel to `columns`.
    pub ref_columns: Vec<String>,
    pub on_delete: String,
    pub on_update: String,
    /// ALTER TABLE ... ADD CONSTRAINT statement.
    pub create_statement: String,
}

/// View definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    pub create_statement: String,
    /// Names referenced after FROM/JOIN in the definition. May include base
    /// tables, which ordering ignores.
    pub dependencies: Vec<String>,
}

/// Sequence definition (PostgreSQL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDef {
    pub name: String,
    pub create_statement: String,
    pub current_value: i64,
    /// Owning table, when the sequence is attached to a column.
    pub owner_table: Option<String>,
    pub owner_column: Option<String>,
}

/// Per-table outcome of the data stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    pub table: String,
    /// Rows inserted, or the estimate in dry-run mode.
    pub rows_copied: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    /// Stats for a table that was skipped without reading any rows.
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows_copied: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Summary of a database captured during pre-flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub version: String,
    pub major_version: u32,
    pub table_count: u64,
    pub view_count: u64,
    /// Total size in bytes.
    pub total_size: u64,
    /// Base table names, sorted.
    pub tables: Vec<String>,
}

impl DatabaseInfo {
    /// True when the database holds no base tables.
    pub fn is_empty(&self) -> bool {
        self.table_count == 0
    }
}

/// Objects a wipe has to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseObjects {
    pub tables: Vec<String>,
    pub views: Vec<String>,
    pub sequences: Vec<String>,
}

/// Read-only statistics shown by the `analyze` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseAnalytics {
    pub engine: String,
    pub database: String,
    pub version: String,
    /// Server settings worth showing, as (label, value).
    pub settings: Vec<(String, String)>,
    pub uptime_seconds: Option<u64>,
    pub table_count: u64,
    pub total_size: u64,
    pub tables: Vec<TableStat>,
    pub indexes: Vec<IndexStat>,
    pub foreign_keys: Vec<ForeignKeyStat>,
    /// Connection counters, as (label, value).
    pub connections: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStat {
    pub name: String,
    /// Storage engine (MySQL only).
    pub engine: Option<String>,
    pub estimated_rows: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStat {
    pub table: String,
    pub name: String,
    /// Comma-separated column list, when the catalog exposes it.
    pub columns: Option<String>,
    pub is_unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyStat {
    pub table: String,
    pub column: String,
    pub constraint: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_info_is_empty() {
        let mut info = DatabaseInfo::default();
        assert!(info.is_empty());
        info.table_count = 5;
        assert!(!info.is_empty());
    }
}
