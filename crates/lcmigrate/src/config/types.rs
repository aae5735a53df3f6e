//! Configuration type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Database engine family.
///
/// Both sides of a migration must belong to the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Engine {
    /// MySQL and MariaDB.
    Mysql,
    /// PostgreSQL.
    Pgsql,
}

impl Engine {
    /// Canonical engine name (`mysql` or `pgsql`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Mysql => "mysql",
            Engine::Pgsql => "pgsql",
        }
    }

    /// Default server port for the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::Mysql => 3306,
            Engine::Pgsql => 5432,
        }
    }
}

impl FromStr for Engine {
    type Err = MigrateError;

    /// Parse an engine name, accepting the common aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Engine::Pgsql),
            other => Err(MigrateError::Config(format!(
                "Unsupported database engine '{}'. Valid values: mysql, pgsql",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Engine {
    type Error = MigrateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Engine> for String {
    fn from(engine: Engine) -> Self {
        engine.as_str().to_string()
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters for one side of a migration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Engine family.
    pub engine: Engine,

    /// Database host (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port. Falls back to the engine default when unset.
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl DatabaseConfig {
    /// Create a config with the engine default port and host.
    pub fn new(engine: Engine, database: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            engine,
            host: default_host(),
            port: None,
            database: database.into(),
            user: user.into(),
            password: String::new(),
        }
    }

    /// Port to connect to.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }

    /// Display form used in logs and pre-flight messages (no password).
    pub fn display_target(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.engine,
            self.user,
            self.host,
            self.effective_port(),
            self.database
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Root configuration for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Database to copy from.
    pub source: DatabaseConfig,

    /// Database to copy into.
    pub destination: DatabaseConfig,

    /// Perform reads and estimates only.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}
