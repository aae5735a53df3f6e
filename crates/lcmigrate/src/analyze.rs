//! Read-only database analytics for the `analyze` command.

use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::schema::DatabaseAnalytics;
use crate::drivers::Connector;
use crate::error::Result;

/// Connect to one database and collect its analytics.
pub async fn analyze_database(
    connector: &dyn Connector,
    config: &DatabaseConfig,
) -> Result<DatabaseAnalytics> {
    let mut db = connector.connect(config).await?;
    let analytics = db.catalog.analyze(db.conn.as_mut(), &db.database).await;
    db.close().await;

    let mut analytics = analytics?;
    if analytics.engine.is_empty() {
        analytics.engine = config.engine.to_string();
    }
    info!(
        "Analyzed {}: {} tables, {} indexes, {} foreign keys",
        config.display_target(),
        analytics.table_count,
        analytics.indexes.len(),
        analytics.foreign_keys.len()
    );
    Ok(analytics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Engine;
    use crate::core::schema::DatabaseInfo;
    use crate::testing::{MockCatalog, MockConnection, MockConnector, MockEndpoint};

    #[tokio::test]
    async fn test_analyze_closes_connection() {
        let conn = MockConnection::new();
        let catalog = MockCatalog::new().with_info(DatabaseInfo {
            version: "16.2".into(),
            table_count: 7,
            ..Default::default()
        });
        let connector = MockConnector::new()
            .with_endpoint("shop", MockEndpoint::new(Engine::Pgsql, conn.clone(), catalog));

        let analytics = analyze_database(&connector, &DatabaseConfig::new(Engine::Pgsql, "shop", "app"))
            .await
            .unwrap();

        assert_eq!(analytics.engine, "pgsql");
        assert_eq!(analytics.database, "shop");
        assert_eq!(analytics.table_count, 7);
        assert!(conn.is_closed());
    }
}
