//! # lcmigrate
//!
//! Full-database migration between servers of the same engine family.
//!
//! This library copies a complete MySQL/MariaDB or PostgreSQL database into
//! another server of the same family:
//!
//! - **Pre-flight validation**: connection, engine, version and emptiness checks
//! - **Schema reconstruction**: tables, indexes, foreign keys, views and sequences
//! - **Batched data transfer** with foreign key checks suspended
//! - **Row count verification** once the data is in place
//! - **Dry-run mode** that reads the source and writes nothing
//!
//! ## Example
//!
//! ```rust,no_run
//! use lcmigrate::{MigrationConfig, OsEnv, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> lcmigrate::Result<()> {
//!     let config = MigrationConfig::from_env(&OsEnv, false)?;
//!     let result = Orchestrator::new(config).run().await?;
//!     println!("Copied {} rows", result.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod analyze;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod format;
pub mod orchestrator;
pub mod preflight;
pub mod report;
pub mod schema;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use analyze::analyze_database;
pub use config::{DatabaseConfig, Engine, EnvProvider, MapEnv, MigrationConfig, OsEnv};
pub use crate::core::schema::{DatabaseAnalytics, DatabaseInfo, TransferStats};
pub use drivers::{Connector, Database, DriverConnector, SslMode};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, MigrationStatus, Orchestrator};
pub use preflight::CheckResult;
pub use report::{AssumeYes, NonInteractive, NullReporter, Prompter, Reporter, Stage, TracingReporter};
pub use transfer::{TransferConfig, TransferEngine, DEFAULT_BATCH_SIZE};
