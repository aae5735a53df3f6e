//! lcmigrate CLI - Full-database migration between MySQL or PostgreSQL servers.

mod console;
mod wizard;

use clap::{Parser, Subcommand};
use lcmigrate::config::{load_dotenv, ConnectionDefaults};
use lcmigrate::{
    analyze_database, AssumeYes, DatabaseConfig, DriverConnector, MigrateError, MigrationConfig,
    NonInteractive, Orchestrator, OsEnv, Prompter, Reporter, TracingReporter,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use console::ConsoleReporter;
use wizard::DialoguerPrompter;

#[derive(Parser)]
#[command(name = "lcmigrate")]
#[command(about = "Copy a complete MySQL or PostgreSQL database to another server")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file (overrides environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a .env file [default: .env in the working directory]
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Output format for results: text or json
    #[arg(long, default_value = "text")]
    output: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Never prompt; missing credentials are an error and confirmations are declined
    #[arg(long)]
    no_prompt: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show analytics for the source database
    Analyze {
        /// Analyze the destination database instead
        #[arg(long)]
        destination: bool,
    },

    /// Migrate the source database to the destination
    Migrate {
        /// Dry run: read the source and report what would happen, write nothing
        #[arg(long)]
        dry_run: bool,

        /// Rows fetched and inserted per batch
        #[arg(long, default_value_t = lcmigrate::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;
    let json = parse_format("output format", &cli.output)?;

    if let Some(path) = &cli.env_file {
        if !path.exists() {
            return Err(MigrateError::Config(format!(
                "env file not found: {}",
                path.display()
            )));
        }
    }
    load_dotenv(cli.env_file.as_deref())?;

    let interactive = !cli.no_prompt && std::io::stdin().is_terminal();

    match cli.command {
        Commands::Analyze { destination } => {
            let side = if destination { "destination" } else { "source" };
            let target = match &cli.config {
                Some(path) => {
                    let config = MigrationConfig::load(path)?;
                    info!("Loaded configuration from {:?}", path);
                    if destination {
                        config.destination
                    } else {
                        config.source
                    }
                }
                None => {
                    let defaults = if destination {
                        ConnectionDefaults::destination(&OsEnv)
                    } else {
                        ConnectionDefaults::source(&OsEnv)
                    };
                    resolve_side(defaults, side, interactive)?
                }
            };

            let analytics = analyze_database(&DriverConnector, &target).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                console::print_analytics(&analytics);
            }
        }

        Commands::Migrate {
            dry_run,
            batch_size,
        } => {
            if batch_size == 0 {
                return Err(MigrateError::Config(
                    "--batch-size must be at least 1".to_string(),
                ));
            }

            let mut config = match &cli.config {
                Some(path) => {
                    let config = MigrationConfig::load(path)?;
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                None => MigrationConfig {
                    source: resolve_side(ConnectionDefaults::source(&OsEnv), "source", interactive)?,
                    destination: resolve_side(
                        ConnectionDefaults::destination(&OsEnv),
                        "destination",
                        interactive,
                    )?,
                    dry_run: false,
                },
            };
            config.dry_run |= dry_run;
            config.validate()?;

            let reporter: Arc<dyn Reporter> = if json {
                Arc::new(TracingReporter)
            } else {
                Arc::new(ConsoleReporter::new())
            };
            let prompter: Arc<dyn Prompter> = if cli.yes {
                Arc::new(AssumeYes)
            } else if interactive {
                Arc::new(DialoguerPrompter)
            } else {
                Arc::new(NonInteractive)
            };

            let result = Orchestrator::new(config)
                .with_reporter(reporter)
                .with_prompter(prompter)
                .with_batch_size(batch_size)
                .run()
                .await?;

            if json {
                println!("{}", result.to_json()?);
            } else {
                console::print_summary(&result);
            }
        }
    }

    Ok(())
}

/// Resolve one side's connection, prompting for missing fields when allowed.
fn resolve_side(
    defaults: ConnectionDefaults,
    side: &str,
    interactive: bool,
) -> Result<DatabaseConfig, MigrateError> {
    if interactive && !defaults.missing_fields().is_empty() {
        let filled = wizard::prompt_connection(side, &defaults)?;
        return filled.into_config(side);
    }
    defaults.into_config(side)
}

/// `true` for json, `false` for text.
fn parse_format(what: &str, value: &str) -> Result<bool, MigrateError> {
    match value.to_lowercase().as_str() {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(MigrateError::Config(format!(
            "unknown {} '{}' (expected text or json)",
            what, other
        ))),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), MigrateError> {
    let json = parse_format("log format", format)?;
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            return Err(MigrateError::Config(format!(
                "unknown verbosity '{}' (expected debug, info, warn or error)",
                other
            )))
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
