//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlConnection`]: a mysql_async session
//! - [`MysqlCatalog`]: schema, size and analytics queries
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod catalog;
mod connection;
mod dialect;

pub use catalog::MysqlCatalog;
pub use connection::MysqlConnection;
pub use dialect::MysqlDialect;
