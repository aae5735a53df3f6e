//! Interactive prompts for connection details and confirmations.

use dialoguer::{Confirm, Input, Password, Select};
use lcmigrate::config::ConnectionDefaults;
use lcmigrate::{Engine, MigrateError, Prompter};

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// Terminal IO error.
    Io(std::io::Error),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

impl From<WizardError> for MigrateError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::Io(io) => MigrateError::Io(io),
        }
    }
}

const ENGINES: &[&str] = &["mysql", "pgsql"];

/// Ask for every connection field of one side, offering the environment's
/// values as defaults.
pub fn prompt_connection(side: &str, defaults: &ConnectionDefaults) -> WizardResult<ConnectionDefaults> {
    let title = format!("{} database", capitalize(side));
    eprintln!();
    eprintln!("{}", title);
    eprintln!("{}", "-".repeat(title.len()));

    let engine_idx = defaults
        .engine
        .as_deref()
        .and_then(|e| e.parse::<Engine>().ok())
        .and_then(|e| ENGINES.iter().position(|&name| name == e.as_str()))
        .unwrap_or(0);
    let engine_idx = Select::new()
        .with_prompt("  Engine")
        .items(ENGINES)
        .default(engine_idx)
        .interact()?;
    let engine = if engine_idx == 1 { Engine::Pgsql } else { Engine::Mysql };

    let host: String = Input::new()
        .with_prompt("  Host")
        .default(defaults.host.clone().unwrap_or_else(|| "localhost".to_string()))
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("  Port")
        .default(
            defaults
                .port
                .as_deref()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or_else(|| engine.default_port()),
        )
        .interact_text()?;

    let database: String = Input::new()
        .with_prompt("  Database")
        .default(defaults.database.clone().unwrap_or_default())
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User")
        .default(defaults.user.clone().unwrap_or_default())
        .interact_text()?;

    let password = prompt_password("  Password", defaults.password.is_some())?;
    let password = if password.is_empty() {
        defaults.password.clone().unwrap_or(password)
    } else {
        password
    };

    eprintln!();

    Ok(ConnectionDefaults {
        engine: Some(engine.as_str().to_string()),
        host: Some(host),
        port: Some(port.to_string()),
        database: Some(database).filter(|d| !d.is_empty()),
        user: Some(user).filter(|u| !u.is_empty()),
        password: Some(password),
    })
}

fn prompt_password(prompt: &str, has_existing: bool) -> WizardResult<String> {
    let prompt = if has_existing {
        format!("{} (leave blank to keep current)", prompt)
    } else {
        prompt.to_string()
    };

    Ok(Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Yes/no confirmations on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, question: &str, default: bool) -> lcmigrate::Result<bool> {
        Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(|e| WizardError::from(e).into())
    }
}
