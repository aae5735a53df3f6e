//! Terminal rendering: live progress, migration summary, analytics report.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use lcmigrate::format::{format_bytes, format_duration, format_number, format_uptime};
use lcmigrate::{CheckResult, DatabaseAnalytics, MigrationResult, MigrationStatus, Reporter, Stage};

/// Reporter that prints colored progress to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn stage_started(&self, stage: Stage) {
        println!("\n{}", stage.to_string().bold());
    }

    fn stage_finished(&self, _stage: Stage, elapsed: Duration) {
        println!("  {}", format!("done in {}", format_duration(elapsed)).dimmed());
    }

    fn stage_skipped(&self, _stage: Stage, reason: &str) {
        println!("  {}", format!("skipped: {}", reason).yellow());
    }

    fn check(&self, check: &CheckResult) {
        let mark = match check.status() {
            "ok" => "✓".green(),
            "warn" => "!".yellow(),
            _ => "✗".red(),
        };
        println!("  {} {}: {}", mark, check.name.bold(), check.message);
    }

    fn table_progress(&self, table: &str, copied: u64) {
        print!("\r  {} {} rows", table, format_number(copied));
        let _ = std::io::stdout().flush();
    }

    fn table_finished(&self, table: &str, rows: u64, elapsed: Duration) {
        println!(
            "\r  {} {} {} rows ({})",
            "✓".green(),
            table,
            format_number(rows),
            format_duration(elapsed)
        );
    }

    fn info(&self, message: &str) {
        println!("  {}", message);
    }

    fn warn(&self, message: &str) {
        println!("  {} {}", "!".yellow(), message.yellow());
    }
}

/// Print the end-of-run summary.
pub fn print_summary(result: &MigrationResult) {
    let headline = match result.status {
        MigrationStatus::Completed => "Migration completed!".green().bold(),
        MigrationStatus::DryRun => "Dry run completed!".cyan().bold(),
        MigrationStatus::Aborted => "Migration aborted".yellow().bold(),
    };
    println!("\n{}", headline);
    if let Some(reason) = &result.reason {
        println!("  Reason: {}", reason);
    }
    println!("  Run ID: {}", result.run_id);
    println!("  {} -> {}", result.source, result.destination);
    println!("  Duration: {}", format_duration(result.duration()));
    if result.is_aborted() {
        return;
    }

    let rows_label = if result.status == MigrationStatus::DryRun {
        "Rows (estimated)"
    } else {
        "Rows"
    };
    println!("  Tables: {}", format_number(result.tables_total as u64));
    println!("  {}: {}", rows_label, format_number(result.rows_copied));

    let secs = result.duration_seconds;
    if result.status == MigrationStatus::Completed && secs > 0.0 {
        let per_sec = (result.rows_copied as f64 / secs) as u64;
        println!("  Throughput: {} rows/sec", format_number(per_sec));
    }
}

/// Print an analytics report in sections.
pub fn print_analytics(analytics: &DatabaseAnalytics) {
    section("Server");
    row("Engine", &analytics.engine);
    row("Database", &analytics.database);
    row("Version", &analytics.version);
    if let Some(uptime) = analytics.uptime_seconds {
        row("Uptime", &format_uptime(uptime));
    }
    row("Tables", &format_number(analytics.table_count));
    row("Total size", &format_bytes(analytics.total_size));

    if !analytics.settings.is_empty() {
        section("Settings");
        for (name, value) in &analytics.settings {
            row(name, value);
        }
    }

    if !analytics.tables.is_empty() {
        section("Tables");
        let width = column_width(analytics.tables.iter().map(|t| t.name.as_str()));
        for table in &analytics.tables {
            println!(
                "  {:<width$}  {:>14} rows  {:>10}  {}",
                table.name,
                format_number(table.estimated_rows),
                format_bytes(table.size),
                table.engine.as_deref().unwrap_or(""),
                width = width
            );
        }
    }

    if !analytics.indexes.is_empty() {
        section("Indexes");
        for index in &analytics.indexes {
            let kind = if index.is_unique { "unique" } else { "" };
            println!(
                "  {}.{} ({}) {}",
                index.table,
                index.name,
                index.columns.as_deref().unwrap_or("expression"),
                kind.dimmed()
            );
        }
    }

    if !analytics.foreign_keys.is_empty() {
        section("Foreign keys");
        for fk in &analytics.foreign_keys {
            println!(
                "  {}.{} -> {}.{} {}",
                fk.table,
                fk.column,
                fk.ref_table,
                fk.ref_column,
                format!("[{}]", fk.constraint).dimmed()
            );
        }
    }

    if !analytics.connections.is_empty() {
        section("Connections");
        for (name, value) in &analytics.connections {
            row(name, value);
        }
    }
}

fn section(title: &str) {
    println!("\n{}", title.bold().underline());
}

fn row(label: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", label), value);
}

fn column_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0).min(48)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_width_is_capped() {
        let long = "x".repeat(80);
        assert_eq!(column_width(["a", "abcd"].into_iter()), 4);
        assert_eq!(column_width([long.as_str()].into_iter()), 48);
        assert_eq!(column_width(std::iter::empty()), 0);
    }
}
