//! Configuration loading and validation.

mod env;
mod types;
mod validation;

pub use env::{load_dotenv, ConnectionDefaults, EnvProvider, MapEnv, OsEnv};
pub use types::*;

use crate::error::Result;
use std::path::Path;

impl MigrationConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MigrationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables alone.
    pub fn from_env(env: &impl EnvProvider, dry_run: bool) -> Result<Self> {
        let config = MigrationConfig {
            source: ConnectionDefaults::source(env).into_config("source")?,
            destination: ConnectionDefaults::destination(env).into_config("destination")?,
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source:
  engine: mariadb
  host: old-db
  database: shop
  user: root
  password: secret
destination:
  engine: mysql
  host: new-db
  port: 3307
  database: shop
  user: root
dry_run: true
"#;

    #[test]
    fn test_from_yaml() {
        let config = MigrationConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.source.engine, Engine::Mysql);
        assert_eq!(config.source.effective_port(), 3306);
        assert_eq!(config.destination.effective_port(), 3307);
        assert_eq!(config.destination.password, "");
        assert!(config.dry_run);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_engine() {
        let yaml = YAML.replace("engine: mariadb", "engine: oracle");
        assert!(MigrationConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = MigrationConfig::load(&path).unwrap();
        assert_eq!(config.source.host, "old-db");
    }

    #[test]
    fn test_from_env() {
        let env = MapEnv::new()
            .with("DB_CONNECTION", "pgsql")
            .with("DB_HOST", "old-db")
            .with("DB_DATABASE", "shop")
            .with("DB_USERNAME", "app")
            .with("DESTINATION_DB_ENGINE", "postgres")
            .with("DESTINATION_DB_HOST", "new-db")
            .with("DESTINATION_DB_DATABASE", "shop")
            .with("DESTINATION_DB_USER", "app");
        let config = MigrationConfig::from_env(&env, false).unwrap();
        assert_eq!(config.source.engine, Engine::Pgsql);
        assert_eq!(config.destination.engine, Engine::Pgsql);
        assert_eq!(config.source.user, "app");
    }

    #[test]
    fn test_from_env_requires_destination() {
        let env = MapEnv::new()
            .with("DB_CONNECTION", "mysql")
            .with("DB_DATABASE", "shop")
            .with("DB_USERNAME", "app");
        let err = MigrationConfig::from_env(&env, false).unwrap_err();
        assert!(err.to_string().contains("destination connection is missing"));
    }

    #[test]
    fn test_engine_aliases() {
        assert_eq!("postgresql".parse::<Engine>().unwrap(), Engine::Pgsql);
        assert_eq!("Postgres".parse::<Engine>().unwrap(), Engine::Pgsql);
        assert_eq!("mariadb".parse::<Engine>().unwrap(), Engine::Mysql);
        assert!("sqlite".parse::<Engine>().is_err());
        assert_eq!(Engine::Pgsql.default_port(), 5432);
        assert_eq!(Engine::Mysql.default_port(), 3306);
    }
}
