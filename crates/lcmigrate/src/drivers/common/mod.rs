//! Helpers shared by the driver implementations.
//!
//! - [`tls`]: SSL mode negotiation and the rustls connector for PostgreSQL

pub mod tls;

pub use tls::{pg_connector, SslMode};

use crate::core::traits::Connection;
use crate::core::value::Row;
use crate::error::{MigrateError, Result};

/// Run a query expected to produce at least one row and return the first.
pub(crate) async fn fetch_one(conn: &mut dyn Connection, sql: &str) -> Result<Row> {
    conn.query(sql)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| MigrateError::query("query returned no rows", sql))
}

/// Case-insensitive check of a driver error message against known phrases.
///
/// Fallback for drivers that do not expose a structured error code.
pub(crate) fn message_matches(message: &str, needles: &[&str]) -> bool {
    let lower = message.to_lowercase();
    needles.iter().any(|n| lower.contains(&n.to_lowercase()))
}
