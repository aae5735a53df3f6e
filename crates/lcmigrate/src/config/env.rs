//! Credential resolution from environment variables.
//!
//! The source side reads `SOURCE_DB_*` first and falls back to the unprefixed
//! `DB_*` variables, so an application's own `.env` doubles as the source
//! definition. The destination side only reads `DESTINATION_DB_*`.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::types::{DatabaseConfig, Engine};
use crate::error::{MigrateError, Result};

const SOURCE_ENGINE: &[&str] = &[
    "SOURCE_DB_ENGINE",
    "SOURCE_DB_CONNECTION",
    "DB_ENGINE",
    "DB_CONNECTION",
];
const SOURCE_HOST: &[&str] = &["SOURCE_DB_HOST", "DB_HOST"];
const SOURCE_PORT: &[&str] = &["SOURCE_DB_PORT", "DB_PORT"];
const SOURCE_DATABASE: &[&str] = &[
    "SOURCE_DB_DATABASE",
    "SOURCE_DB_NAME",
    "DB_DATABASE",
    "DB_NAME",
];
const SOURCE_USER: &[&str] = &[
    "SOURCE_DB_USER",
    "SOURCE_DB_USERNAME",
    "DB_USER",
    "DB_USERNAME",
];
const SOURCE_PASSWORD: &[&str] = &["SOURCE_DB_PASSWORD", "DB_PASSWORD"];

const DEST_ENGINE: &[&str] = &["DESTINATION_DB_ENGINE", "DESTINATION_DB_CONNECTION"];
const DEST_HOST: &[&str] = &["DESTINATION_DB_HOST"];
const DEST_PORT: &[&str] = &["DESTINATION_DB_PORT"];
const DEST_DATABASE: &[&str] = &["DESTINATION_DB_DATABASE", "DESTINATION_DB_NAME"];
const DEST_USER: &[&str] = &["DESTINATION_DB_USER", "DESTINATION_DB_USERNAME"];
const DEST_PASSWORD: &[&str] = &["DESTINATION_DB_PASSWORD"];

/// Source of environment values.
pub trait EnvProvider {
    /// Value of `key`, treating empty strings as unset.
    fn get(&self, key: &str) -> Option<String>;

    /// First non-empty value among `keys`.
    fn get_first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Reads the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl EnvProvider for OsEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory environment, mostly for tests.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvProvider for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Load a `.env` file into the process environment if one exists.
///
/// Variables already present in the environment win over the file.
pub fn load_dotenv(path: Option<&Path>) -> Result<bool> {
    let result = match path {
        Some(p) => dotenvy::from_path(p).map(|_| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match result {
        Ok(loaded) => {
            debug!("Loaded environment from {:?}", loaded);
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(MigrateError::Config(format!("Failed to read .env file: {}", e))),
    }
}

/// Connection fields as found in the environment, before prompting.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionDefaults {
    pub engine: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDefaults")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ConnectionDefaults {
    /// Source defaults: `SOURCE_DB_*` overrides `DB_*`.
    pub fn source(env: &impl EnvProvider) -> Self {
        Self {
            engine: env.get_first(SOURCE_ENGINE),
            host: env.get_first(SOURCE_HOST),
            port: env.get_first(SOURCE_PORT),
            database: env.get_first(SOURCE_DATABASE),
            user: env.get_first(SOURCE_USER),
            password: env.get_first(SOURCE_PASSWORD),
        }
    }

    /// Destination defaults: `DESTINATION_DB_*` only.
    pub fn destination(env: &impl EnvProvider) -> Self {
        Self {
            engine: env.get_first(DEST_ENGINE),
            host: env.get_first(DEST_HOST),
            port: env.get_first(DEST_PORT),
            database: env.get_first(DEST_DATABASE),
            user: env.get_first(DEST_USER),
            password: env.get_first(DEST_PASSWORD),
        }
    }

    /// True when the environment supplied anything identifying a server.
    pub fn is_present(&self) -> bool {
        self.host.is_some() || self.user.is_some() || self.database.is_some()
    }

    /// Names of required fields that are still missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.engine.is_none() {
            missing.push("engine");
        }
        if self.database.is_none() {
            missing.push("database");
        }
        if self.user.is_none() {
            missing.push("user");
        }
        missing
    }

    /// Build a validated config. `side` names the side in error messages.
    pub fn into_config(self, side: &str) -> Result<DatabaseConfig> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(MigrateError::Config(format!(
                "{} connection is missing: {}",
                side,
                missing.join(", ")
            )));
        }

        let engine: Engine = self.engine.unwrap_or_default().parse()?;
        let port = match self.port {
            Some(p) => Some(p.trim().parse::<u16>().map_err(|_| {
                MigrateError::Config(format!("{} port '{}' is not a valid port", side, p))
            })?),
            None => None,
        };

        Ok(DatabaseConfig {
            engine,
            host: self.host.unwrap_or_else(|| "localhost".to_string()),
            port,
            database: self.database.unwrap_or_default(),
            user: self.user.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        })
    }
}
