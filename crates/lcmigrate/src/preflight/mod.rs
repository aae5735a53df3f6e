//! Pre-flight validation.
//!
//! Connects both sides, compares engines and versions, and gets the
//! destination into an empty state before any stage runs. Every check is
//! recorded as a [`CheckResult`]; a declined confirmation ends the run as
//! [`PreflightOutcome::Aborted`], which callers treat differently from an
//! error.

mod wipe;

pub use wipe::wipe_database;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, MigrationConfig};
use crate::core::schema::DatabaseInfo;
use crate::drivers::{Connector, Database, SslMode};
use crate::error::{MigrateError, Result};
use crate::format::format_bytes;
use crate::report::{Prompter, Reporter};

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)").expect("valid version regex"));

/// Major version from a server version string (`8.0.36-log` -> 8), or 0.
pub fn extract_major_version(version: &str) -> u32 {
    VERSION_RE
        .captures(version)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Outcome of one pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Passed, but worth the user's attention.
    pub warning: bool,
    pub message: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            warning: false,
            message: message.into(),
        }
    }

    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            warning: true,
            ..Self::pass(name, message)
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(name, message)
        }
    }

    /// Short status label (`ok`, `warn`, `fail`).
    pub fn status(&self) -> &'static str {
        match (self.passed, self.warning) {
            (false, _) => "fail",
            (true, true) => "warn",
            (true, false) => "ok",
        }
    }
}

/// What pre-flight learned about both sides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
    pub source_info: DatabaseInfo,
    pub destination_info: DatabaseInfo,
    /// The destination database does not exist yet (dry-run only).
    pub destination_missing: bool,
}

/// Verdict of a pre-flight run. Failures are returned as errors.
#[derive(Debug)]
pub enum PreflightOutcome {
    Passed {
        source: Database,
        /// `None` only in dry-run mode when the destination does not exist.
        destination: Option<Database>,
        report: PreflightReport,
    },
    Aborted {
        reason: String,
        report: PreflightReport,
    },
}

/// Runs the pre-flight checks.
pub struct Preflight<'a> {
    connector: &'a dyn Connector,
    reporter: &'a dyn Reporter,
    prompter: &'a dyn Prompter,
    report: PreflightReport,
}

impl<'a> Preflight<'a> {
    pub fn new(
        connector: &'a dyn Connector,
        reporter: &'a dyn Reporter,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            connector,
            reporter,
            prompter,
            report: PreflightReport::default(),
        }
    }

    fn record(&mut self, check: CheckResult) {
        self.reporter.check(&check);
        self.report.checks.push(check);
    }

    fn abort(self, reason: impl Into<String>) -> PreflightOutcome {
        let reason = reason.into();
        info!("Pre-flight aborted: {}", reason);
        PreflightOutcome::Aborted {
            reason,
            report: self.report,
        }
    }

    /// Run every check against the configured endpoints.
    pub async fn run(mut self, config: &MigrationConfig) -> Result<PreflightOutcome> {
        let dry_run = config.dry_run;

        let mut source = match self.connector.connect(&config.source).await {
            Ok(db) => db,
            Err(e) => {
                self.record(CheckResult::fail("Source connection", e.to_string()));
                return Err(e);
            }
        };
        self.record_connection("Source connection", &config.source, &source);

        let mut source_info = source.info().await?;
        source_info.major_version = extract_major_version(&source_info.version);
        debug!("Source info: {:?}", source_info);

        let destination_result = self.connector.connect(&config.destination).await;

        if config.source.engine != config.destination.engine {
            self.record(CheckResult::fail(
                "Engine compatibility",
                format!(
                    "source is {}, destination is {}",
                    config.source.engine, config.destination.engine
                ),
            ));
            if let Ok(db) = destination_result {
                db.close().await;
            }
            source.close().await;
            return Err(MigrateError::EngineMismatch {
                source_engine: config.source.engine.to_string(),
                destination_engine: config.destination.engine.to_string(),
            });
        }
        self.record(CheckResult::pass(
            "Engine compatibility",
            format!("both sides are {}", config.source.engine),
        ));

        let destination = match destination_result {
            Ok(db) => Some(db),
            Err(e) if e.is_database_not_exists() => {
                if dry_run {
                    self.record(CheckResult::warn(
                        "Destination connection",
                        format!(
                            "database \"{}\" does not exist; it would be created",
                            config.destination.database
                        ),
                    ));
                    None
                } else {
                    let question = format!(
                        "Destination database \"{}\" does not exist. Create it?",
                        config.destination.database
                    );
                    if !self.prompter.confirm(&question, true)? {
                        source.close().await;
                        return Ok(self.abort("destination database was not created"));
                    }
                    self.connector.create_database(&config.destination).await?;
                    info!("Created database {}", config.destination.database);
                    Some(self.connector.connect(&config.destination).await?)
                }
            }
            Err(e) => {
                self.record(CheckResult::fail("Destination connection", e.to_string()));
                source.close().await;
                return Err(e);
            }
        };

        let Some(mut destination) = destination else {
            self.report.destination_info = DatabaseInfo {
                version: source_info.version.clone(),
                major_version: source_info.major_version,
                ..Default::default()
            };
            self.report.destination_missing = true;
            self.report_summary(&source_info);
            self.report.source_info = source_info;
            return Ok(PreflightOutcome::Passed {
                source,
                destination: None,
                report: self.report,
            });
        };
        self.record_connection("Destination connection", &config.destination, &destination);

        let mut destination_info = destination.info().await?;
        destination_info.major_version = extract_major_version(&destination_info.version);

        if source_info.major_version != destination_info.major_version {
            let message = format!(
                "source {} is {}, destination is {}",
                config.source.engine, source_info.version, destination_info.version
            );
            self.record(CheckResult::warn("Version compatibility", message.clone()));
            if !self
                .prompter
                .confirm("Major versions differ. Continue anyway?", false)?
            {
                source.close().await;
                destination.close().await;
                return Ok(self.abort(format!("version mismatch ({})", message)));
            }
        } else {
            self.record(CheckResult::pass(
                "Version compatibility",
                format!("major version {}", source_info.major_version),
            ));
        }

        if destination_info.is_empty() {
            self.record(CheckResult::pass("Destination contents", "database is empty"));
        } else if dry_run {
            self.record(CheckResult::warn(
                "Destination contents",
                format!(
                    "{} tables and {} views would be dropped",
                    destination_info.table_count, destination_info.view_count
                ),
            ));
        } else {
            let question = format!(
                "Destination database \"{}\" has {} tables. Drop all objects and continue?",
                config.destination.database, destination_info.table_count
            );
            if !self.prompter.confirm(&question, false)? {
                source.close().await;
                destination.close().await;
                return Ok(self.abort("destination database is not empty"));
            }
            let dropped = wipe_database(&mut destination).await?;
            self.record(CheckResult::pass(
                "Destination contents",
                format!(
                    "dropped {} tables, {} views, {} sequences",
                    dropped.tables.len(),
                    dropped.views.len(),
                    dropped.sequences.len()
                ),
            ));
            destination_info = destination.info().await?;
            destination_info.major_version = extract_major_version(&destination_info.version);
        }

        self.report_summary(&source_info);
        self.report.source_info = source_info;
        self.report.destination_info = destination_info;

        Ok(PreflightOutcome::Passed {
            source,
            destination: Some(destination),
            report: self.report,
        })
    }

    fn record_connection(&mut self, name: &str, config: &DatabaseConfig, db: &Database) {
        let target = config.display_target();
        let check = match db.ssl_mode {
            Some(mode) if mode != SslMode::NEGOTIATION_ORDER[0] => {
                CheckResult::warn(name, format!("{} (sslmode={})", target, mode))
            }
            Some(mode) => CheckResult::pass(name, format!("{} (sslmode={})", target, mode)),
            None => CheckResult::pass(name, target),
        };
        self.record(check);
    }

    fn report_summary(&self, source: &DatabaseInfo) {
        self.reporter.info(&format!(
            "Source: {} tables, {} views, {} (version {})",
            source.table_count,
            source.view_count,
            format_bytes(source.total_size),
            source.version
        ));
    }
}
