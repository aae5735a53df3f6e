//! Configuration validation.

use super::{DatabaseConfig, MigrationConfig};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
///
/// Engine agreement is left to pre-flight, which reports it once both sides
/// have been contacted.
pub fn validate(config: &MigrationConfig) -> Result<()> {
    validate_side(&config.source, "source")?;
    validate_side(&config.destination, "destination")?;

    // Cannot migrate to the same database
    if config.source.engine == config.destination.engine
        && config.source.host == config.destination.host
        && config.source.effective_port() == config.destination.effective_port()
        && config.source.database == config.destination.database
    {
        return Err(MigrateError::Config(
            "source and destination cannot be the same database".into(),
        ));
    }

    Ok(())
}

fn validate_side(db: &DatabaseConfig, side: &str) -> Result<()> {
    if db.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(MigrateError::Config(format!(
            "{}.database is required",
            side
        )));
    }
    if db.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", side)));
    }
    if db.port == Some(0) {
        return Err(MigrateError::Config(format!(
            "{}.port must be between 1 and 65535",
            side
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Engine;

    fn valid_config() -> MigrationConfig {
        let mut source = DatabaseConfig::new(Engine::Mysql, "shop", "root");
        source.host = "old-db".to_string();
        source.password = "secret".to_string();
        let mut destination = DatabaseConfig::new(Engine::Mysql, "shop", "root");
        destination.host = "new-db".to_string();
        MigrationConfig {
            source,
            destination,
            dry_run: false,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_database() {
        let mut config = valid_config();
        config.source.database = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.database"));
    }

    #[test]
    fn test_missing_destination_user() {
        let mut config = valid_config();
        config.destination.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.destination.host = config.source.host.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_engine_mismatch_left_to_preflight() {
        let mut config = valid_config();
        config.destination.engine = Engine::Pgsql;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }
}
