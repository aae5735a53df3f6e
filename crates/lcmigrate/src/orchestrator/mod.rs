//! Migration orchestrator - main workflow coordinator.
//!
//! Runs pre-flight, asks for a final confirmation, then drives the six
//! stages over the connections pre-flight handed back:
//!
//! 1. Schema: create every table without foreign keys
//! 2. Data: copy rows with foreign key checks suspended
//! 3. Indexes & constraints
//! 4. Views, in dependency order
//! 5. Sequences
//! 6. Finalize: restore foreign key checks and compare row counts
//!
//! In dry-run mode nothing is written to the destination; the data stage
//! reports source estimates instead.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::core::schema::{TableSchema, TransferStats};
use crate::core::traits::{Connection, Dialect};
use crate::drivers::{Connector, Database, DriverConnector};
use crate::error::{MigrateError, Result};
use crate::format::format_number;
use crate::preflight::{CheckResult, Preflight, PreflightOutcome};
use crate::report::{NonInteractive, Prompter, Reporter, Stage, TracingReporter};
use crate::schema::{extract_sequences, extract_tables, extract_views, SchemaApplier};
use crate::transfer::{count_rows, TransferConfig, TransferEngine};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Completed,
    DryRun,
    Aborted,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationStatus::Completed => "completed",
            MigrationStatus::DryRun => "dry-run",
            MigrationStatus::Aborted => "aborted",
        })
    }
}

/// Timing of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_seconds: f64,
    pub skipped: bool,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: MigrationStatus,

    /// Why the run was aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub source: String,
    pub destination: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables processed.
    pub tables_total: usize,

    /// Rows copied, or the source estimate in dry-run mode.
    pub rows_copied: u64,

    /// Per-table transfer statistics.
    pub tables: Vec<TransferStats>,

    pub stages: Vec<StageTiming>,

    /// Pre-flight checks.
    pub checks: Vec<CheckResult>,
}

impl MigrationResult {
    fn new(config: &MigrationConfig) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            status: if config.dry_run {
                MigrationStatus::DryRun
            } else {
                MigrationStatus::Completed
            },
            reason: None,
            source: config.source.display_target(),
            destination: config.destination.display_target(),
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            tables_total: 0,
            rows_copied: 0,
            tables: Vec::new(),
            stages: Vec::new(),
            checks: Vec::new(),
        }
    }

    fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self
    }

    fn aborted(mut self, reason: String) -> Self {
        self.status = MigrationStatus::Aborted;
        self.reason = Some(reason);
        self.finish()
    }

    pub fn is_aborted(&self) -> bool {
        self.status == MigrationStatus::Aborted
    }

    /// Total duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds.max(0.0))
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: MigrationConfig,
    connector: Arc<dyn Connector>,
    reporter: Arc<dyn Reporter>,
    prompter: Arc<dyn Prompter>,
    transfer: TransferConfig,
}

impl Orchestrator {
    /// Create an orchestrator using the real drivers.
    ///
    /// Progress goes to `tracing` and every confirmation is declined until a
    /// prompter is supplied.
    pub fn new(config: MigrationConfig) -> Self {
        let transfer = TransferConfig {
            dry_run: config.dry_run,
            ..Default::default()
        };
        Self {
            config,
            connector: Arc::new(DriverConnector),
            reporter: Arc::new(TracingReporter),
            prompter: Arc::new(NonInteractive),
            transfer,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Rows read per page during the data stage.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.transfer.batch_size = batch_size.max(1);
        self
    }

    /// Run the migration.
    ///
    /// Declined confirmations produce an `Aborted` result rather than an
    /// error.
    pub async fn run(&self) -> Result<MigrationResult> {
        let mut result = MigrationResult::new(&self.config);
        info!(
            "Starting migration run {}: {} -> {}{}",
            result.run_id,
            result.source,
            result.destination,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        let outcome = Preflight::new(
            self.connector.as_ref(),
            self.reporter.as_ref(),
            self.prompter.as_ref(),
        )
        .run(&self.config)
        .await?;

        let (mut source, mut destination, report) = match outcome {
            PreflightOutcome::Passed {
                source,
                destination,
                report,
            } => (source, destination, report),
            PreflightOutcome::Aborted { reason, report } => {
                result.checks = report.checks;
                self.reporter.warn(&format!("Migration aborted: {}", reason));
                return Ok(result.aborted(reason));
            }
        };
        result.checks = report.checks;

        if !self.config.dry_run {
            let proceed = self.prompter.confirm("Proceed with migration?", true);
            if !matches!(proceed, Ok(true)) {
                source.close().await;
                if let Some(db) = destination {
                    db.close().await;
                }
                proceed?;
                self.reporter.warn("Migration aborted by user");
                return Ok(result.aborted("declined to proceed".to_string()));
            }
        }

        let run = self
            .execute(&mut source, destination.as_mut(), &mut result)
            .await;

        source.close().await;
        if let Some(db) = destination {
            db.close().await;
        }
        run?;

        let result = result.finish();
        info!(
            "Migration {}: {} tables, {} rows in {:.1}s",
            result.status,
            result.tables_total,
            result.rows_copied,
            result.duration_seconds
        );
        Ok(result)
    }

    async fn execute(
        &self,
        source: &mut Database,
        destination: Option<&mut Database>,
        result: &mut MigrationResult,
    ) -> Result<()> {
        let dry_run = self.config.dry_run;
        // Every destination write goes through `live`; it is None in dry-run mode.
        let mut live = if dry_run {
            None
        } else {
            Some(destination.ok_or_else(|| {
                MigrateError::connection(result.destination.clone(), "no destination connection")
            })?)
        };

        // Stage 1: schema
        let started = self.begin(Stage::Schema);
        let tables = extract_tables(source.catalog.as_ref(), source.conn.as_mut()).await?;
        result.tables_total = tables.len();
        match live.as_deref_mut() {
            Some(dest) => {
                let mut applier = SchemaApplier::new(dest.conn.as_mut(), &dest.dialect);
                for table in &tables {
                    applier.create_table(table).await?;
                }
            }
            None => {
                let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
                self.reporter.info(&format!(
                    "Would create {} tables: {}",
                    tables.len(),
                    names.join(", ")
                ));
            }
        }
        self.end(result, Stage::Schema, started);

        // Stage 2: data
        let started = self.begin(Stage::Data);
        if let Some(dest) = live.as_deref_mut() {
            dest.conn.execute(dest.dialect.disable_fk_checks_sql()).await?;
            debug!("Foreign key checks disabled on destination");
        }
        let engine = TransferEngine::new(&source.dialect, self.transfer.clone());
        for table in &tables {
            let reporter = self.reporter.as_ref();
            let name = table.name.as_str();
            let mut progress = |copied: u64| reporter.table_progress(name, copied);
            let stats = engine
                .transfer_table(
                    source.conn.as_mut(),
                    live.as_deref_mut()
                        .map(|d| d.conn.as_mut() as &mut dyn Connection),
                    name,
                    Some(&mut progress),
                )
                .await?;
            self.reporter
                .table_finished(&stats.table, stats.rows_copied, stats.elapsed);
            result.rows_copied += stats.rows_copied;
            result.tables.push(stats);
        }
        if dry_run {
            self.reporter.info(&format!(
                "Would copy {} rows from {} tables",
                format_number(result.rows_copied),
                tables.len()
            ));
        }
        self.end(result, Stage::Data, started);

        // Stage 3: indexes and foreign keys
        let started = self.begin(Stage::Indexes);
        let index_count: usize = tables.iter().map(|t| t.indexes.len()).sum();
        let fk_count: usize = tables.iter().map(|t| t.foreign_keys.len()).sum();
        match live.as_deref_mut() {
            Some(dest) => create_constraints(dest, &tables).await?,
            None => self.reporter.info(&format!(
                "Would create {} indexes and {} foreign keys",
                index_count, fk_count
            )),
        }
        self.end(result, Stage::Indexes, started);

        // Stage 4: views
        let started = self.begin(Stage::Views);
        let views = extract_views(source.catalog.as_ref(), source.conn.as_mut()).await?;
        if views.is_empty() {
            self.skip(result, Stage::Views, "no views");
        } else {
            match live.as_deref_mut() {
                Some(dest) => {
                    let mut applier = SchemaApplier::new(dest.conn.as_mut(), &dest.dialect);
                    for view in &views {
                        applier.create_view(view).await?;
                    }
                }
                None => self
                    .reporter
                    .info(&format!("Would create {} views", views.len())),
            }
            self.end(result, Stage::Views, started);
        }

        // Stage 5: sequences
        let started = self.begin(Stage::Sequences);
        let sequences = extract_sequences(
            source.catalog.as_ref(),
            source.conn.as_mut(),
            &source.dialect,
        )
        .await?;
        if !source.dialect.supports_sequences() {
            self.skip(result, Stage::Sequences, "engine has no sequences");
        } else if sequences.is_empty() {
            self.skip(result, Stage::Sequences, "no sequences");
        } else {
            match live.as_deref_mut() {
                Some(dest) => {
                    let mut applier = SchemaApplier::new(dest.conn.as_mut(), &dest.dialect);
                    for sequence in &sequences {
                        applier.apply_sequence(sequence).await?;
                    }
                }
                None => self
                    .reporter
                    .info(&format!("Would set {} sequences", sequences.len())),
            }
            self.end(result, Stage::Sequences, started);
        }

        // Stage 6: finalize
        let started = self.begin(Stage::Finalize);
        match live.as_deref_mut() {
            Some(dest) => {
                dest.conn.execute(dest.dialect.enable_fk_checks_sql()).await?;
                debug!("Foreign key checks restored on destination");
                verify_row_counts(source, dest, &tables).await?;
                self.end(result, Stage::Finalize, started);
            }
            None => self.skip(result, Stage::Finalize, "dry run"),
        }

        Ok(())
    }

    fn begin(&self, stage: Stage) -> Instant {
        info!("{}", stage);
        self.reporter.stage_started(stage);
        Instant::now()
    }

    fn end(&self, result: &mut MigrationResult, stage: Stage, started: Instant) {
        let elapsed = started.elapsed();
        self.reporter.stage_finished(stage, elapsed);
        result.stages.push(StageTiming {
            stage,
            duration_seconds: elapsed.as_secs_f64(),
            skipped: false,
        });
    }

    /// Close a stage opened with `begin` without doing its work.
    fn skip(&self, result: &mut MigrationResult, stage: Stage, reason: &str) {
        info!("{} skipped: {}", stage, reason);
        self.reporter.stage_skipped(stage, reason);
        result.stages.push(StageTiming {
            stage,
            duration_seconds: 0.0,
            skipped: true,
        });
    }
}

async fn create_constraints(dest: &mut Database, tables: &[TableSchema]) -> Result<()> {
    let mut applier = SchemaApplier::new(dest.conn.as_mut(), &dest.dialect);
    for table in tables {
        for index in &table.indexes {
            applier.create_index(&table.name, index).await?;
        }
    }
    for table in tables {
        for fk in &table.foreign_keys {
            applier.create_foreign_key(&table.name, fk).await?;
        }
    }
    Ok(())
}

async fn verify_row_counts(
    source: &mut Database,
    dest: &mut Database,
    tables: &[TableSchema],
) -> Result<()> {
    for table in tables {
        let source_rows = count_rows(source.conn.as_mut(), &source.dialect, &table.name).await?;
        let destination_rows = count_rows(dest.conn.as_mut(), &dest.dialect, &table.name).await?;
        if source_rows != destination_rows {
            return Err(MigrateError::RowCountMismatch {
                table: table.name.clone(),
                source_rows: source_rows as i64,
                destination_rows: destination_rows as i64,
            });
        }
        debug!("{}: {} rows verified", table.name, destination_rows);
    }
    info!("Row counts verified for {} tables", tables.len());
    Ok(())
}
