//! Core abstractions for engine-agnostic migration.
//!
//! - [`schema`]: table, index, view and sequence definitions
//! - [`value`]: SQL value and row representation
//! - [`traits`]: dialect, connection and catalog traits
//!
//! Driver modules (`drivers/mysql`, `drivers/postgres`) implement the traits;
//! the schema, transfer, pre-flight and orchestrator modules are written
//! against them only.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    DatabaseAnalytics, DatabaseInfo, DatabaseObjects, ForeignKeyDef, ForeignKeyStat, IndexDef,
    IndexStat, SequenceDef, TableSchema, TableStat, TransferStats, ViewDef,
};
pub use traits::{Catalog, Connection, Dialect, PlaceholderStyle};
pub use value::{Row, SqlValue};
