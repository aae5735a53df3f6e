//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresConnection`]: a tokio-postgres session with SSL negotiation
//! - [`PostgresCatalog`]: catalog queries for the `public` schema

mod catalog;
mod connection;
mod dialect;

pub use catalog::PostgresCatalog;
pub use connection::PostgresConnection;
pub use dialect::PostgresDialect;
