//! Table data transfer.
//!
//! Each table is copied on its own. Column names come from a zero-row
//! SELECT, rows are read in LIMIT/OFFSET pages, and every page is written
//! back as multi-row INSERT statements with bound parameters. Tables and
//! batches run one after another over the single source and destination
//! sessions.

use std::time::Instant;

use tracing::{debug, info};

use crate::core::schema::TransferStats;
use crate::core::traits::{Connection, Dialect, PlaceholderStyle};
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::fetch_one;
use crate::error::{MigrateError, Result};
use crate::format::format_duration;

/// Rows read per page unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Callback receiving the cumulative row count after each written batch.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64) + Send);

/// Transfer settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of rows per page.
    pub batch_size: usize,
    /// Report the row estimate instead of copying.
    pub dry_run: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// Copies table data between two sessions of the same engine family.
pub struct TransferEngine<'a> {
    dialect: &'a dyn Dialect,
    config: TransferConfig,
}

impl<'a> TransferEngine<'a> {
    pub fn new(dialect: &'a dyn Dialect, config: TransferConfig) -> Self {
        Self { dialect, config }
    }

    /// Copy one table.
    ///
    /// In dry-run mode only the source is read and the row estimate is
    /// returned as the copied count; `destination` may then be `None`.
    pub async fn transfer_table(
        &self,
        source: &mut dyn Connection,
        destination: Option<&mut dyn Connection>,
        table: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferStats> {
        let start = Instant::now();
        let column_query = format!("SELECT * FROM {} LIMIT 0", self.dialect.quote_ident(table));
        let columns = source
            .column_names(&column_query)
            .await
            .map_err(|e| MigrateError::transfer(table, format!("failed to read columns: {}", e)))?;

        if columns.is_empty() {
            debug!("{}: no columns, skipping", table);
            return Ok(TransferStats::empty(table));
        }

        let estimate = count_rows(source, self.dialect, table)
            .await
            .map_err(|e| MigrateError::transfer(table, format!("failed to count rows: {}", e)))?;

        if self.config.dry_run {
            info!("{}: would copy {} rows", table, estimate);
            return Ok(TransferStats {
                table: table.to_string(),
                rows_copied: estimate,
                elapsed: start.elapsed(),
            });
        }

        let destination = destination
            .ok_or_else(|| MigrateError::transfer(table, "no destination connection"))?;

        let batch_size = self.config.batch_size.max(1);
        let rows_per_insert = rows_per_statement(self.dialect.max_bind_params(), columns.len());
        info!(
            "Starting transfer for {} ({} columns, ~{} rows, batch size {})",
            table,
            columns.len(),
            estimate,
            batch_size
        );

        let mut offset: u64 = 0;
        let mut copied: u64 = 0;
        let mut batches: u64 = 0;

        loop {
            let page = self
                .dialect
                .build_page_query(table, &columns, batch_size, offset);
            let read_start = Instant::now();
            let rows = source.query(&page).await.map_err(|e| {
                MigrateError::transfer(table, format!("failed to read from source: {}", e))
            })?;

            if rows.is_empty() {
                debug!("{}: no more rows to read", table);
                break;
            }
            let read_time = read_start.elapsed();
            let row_count = rows.len();

            for chunk in rows.chunks(rows_per_insert) {
                self.write_chunk(&mut *destination, table, &columns, chunk)
                    .await?;
            }

            copied += row_count as u64;
            offset += row_count as u64;
            batches += 1;
            debug!(
                "{}: batch {} with {} rows (read in {:?}), {} rows total",
                table, batches, row_count, read_time, copied
            );

            if let Some(callback) = progress.as_deref_mut() {
                callback(copied);
            }

            if row_count < batch_size {
                break;
            }
        }

        let elapsed = start.elapsed();
        info!(
            "{}: copied {} rows in {} batches ({})",
            table,
            copied,
            batches,
            format_duration(elapsed)
        );

        Ok(TransferStats {
            table: table.to_string(),
            rows_copied: copied,
            elapsed,
        })
    }

    async fn write_chunk(
        &self,
        destination: &mut dyn Connection,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<()> {
        let sql = build_insert(self.dialect, table, columns, rows.len());
        let params: Vec<SqlValue<'_>> = rows
            .iter()
            .flat_map(|row| row.values().iter().cloned())
            .collect();
        destination
            .execute_with(&sql, &params)
            .await
            .map_err(|e| MigrateError::transfer(table, format!("failed to insert batch: {}", e)))?;
        Ok(())
    }
}

/// Exact row count of a table.
pub async fn count_rows(conn: &mut dyn Connection, dialect: &dyn Dialect, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_ident(table));
    let count = fetch_one(conn, &sql).await?.get_i64(0)?;
    Ok(count.max(0) as u64)
}

/// Rows that fit in one INSERT without exceeding the bind parameter limit.
fn rows_per_statement(max_params: usize, columns: usize) -> usize {
    (max_params / columns.max(1)).max(1)
}

/// Multi-row INSERT with one placeholder tuple per row.
///
/// Positional engines number the placeholders `1..=rows * columns` left to
/// right; the others repeat the same token.
pub fn build_insert(dialect: &dyn Dialect, table: &str, columns: &[String], rows: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let fixed = match dialect.placeholder_style() {
        PlaceholderStyle::Question => Some(dialect.param_placeholder(1)),
        PlaceholderStyle::Positional => None,
    };

    let mut position = 0;
    let tuples: Vec<String> = (0..rows)
        .map(|_| {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|_| {
                    position += 1;
                    fixed
                        .clone()
                        .unwrap_or_else(|| dialect.param_placeholder(position))
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        dialect.quote_ident(table),
        column_list,
        tuples.join(", ")
    )
}
