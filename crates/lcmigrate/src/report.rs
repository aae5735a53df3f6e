//! Progress reporting and confirmation ports.
//!
//! The library never prints or reads the terminal itself. The CLI injects a
//! [`Reporter`] for user-facing output and a [`Prompter`] for yes/no
//! questions; headless callers use [`TracingReporter`] and [`NonInteractive`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::format::{format_duration, format_number};
use crate::preflight::CheckResult;

/// Migration stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    Data,
    Indexes,
    Views,
    Sequences,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Schema,
        Stage::Data,
        Stage::Indexes,
        Stage::Views,
        Stage::Sequences,
        Stage::Finalize,
    ];

    /// 1-based position.
    pub fn number(&self) -> usize {
        match self {
            Stage::Schema => 1,
            Stage::Data => 2,
            Stage::Indexes => 3,
            Stage::Views => 4,
            Stage::Sequences => 5,
            Stage::Finalize => 6,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Schema => "Schema",
            Stage::Data => "Data",
            Stage::Indexes => "Indexes & constraints",
            Stage::Views => "Views",
            Stage::Sequences => "Sequences",
            Stage::Finalize => "Finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Stage::ALL.len(), self.title())
    }
}

/// Receives progress events.
pub trait Reporter: Send + Sync {
    fn stage_started(&self, stage: Stage);

    fn stage_finished(&self, stage: Stage, elapsed: Duration);

    fn stage_skipped(&self, stage: Stage, reason: &str);

    /// Outcome of one pre-flight check.
    fn check(&self, check: &CheckResult);

    /// Cumulative rows copied so far for a table.
    fn table_progress(&self, _table: &str, _copied: u64) {}

    fn table_finished(&self, table: &str, rows: u64, elapsed: Duration);

    fn info(&self, message: &str);

    fn warn(&self, message: &str);
}

/// Answers yes/no questions.
pub trait Prompter: Send + Sync {
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;
}

/// Reporter that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn stage_started(&self, stage: Stage) {
        info!("{}", stage);
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        info!("{} done in {}", stage, format_duration(elapsed));
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        info!("{} skipped: {}", stage, reason);
    }

    fn check(&self, check: &CheckResult) {
        if check.passed && !check.warning {
            info!("[ok] {}: {}", check.name, check.message);
        } else {
            warn!("[{}] {}: {}", check.status(), check.name, check.message);
        }
    }

    fn table_finished(&self, table: &str, rows: u64, elapsed: Duration) {
        info!(
            "{}: {} rows in {}",
            table,
            format_number(rows),
            format_duration(elapsed)
        );
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
    fn stage_skipped(&self, _stage: Stage, _reason: &str) {}
    fn check(&self, _check: &CheckResult) {}
    fn table_finished(&self, _table: &str, _rows: u64, _elapsed: Duration) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}

/// Answers yes to everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        info!("{} yes (assumed)", question);
        Ok(true)
    }
}

/// Declines every question. Used when no terminal is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        warn!("{} no (not interactive; pass --yes to confirm)", question);
        Ok(false)
    }
}
