//! Database layer for PaperVault
//!
//! Provides:
//! - SeaORM entity model for `research_metadata`
//! - The `MetadataStore` abstraction and its implementations
//! - Connection pool management

pub mod models;
mod repository;
mod store;

pub use repository::Repository;
pub use store::{
    MemoryMetadataStore, MetadataStore, NewPaper, PaperQuery, SortField, SortOrder, DEFAULT_LIMIT,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(
            max_connections = config.max_connections,
            "Connecting to database..."
        );

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Get the shared connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}

/// Create a metadata store based on configuration
pub async fn create_metadata_store(config: &DatabaseConfig) -> Result<Arc<dyn MetadataStore>> {
    match config.provider.as_str() {
        "postgres" => {
            if config.url.is_empty() {
                return Err(AppError::Configuration {
                    message: "database.url is required for the postgres provider".to_string(),
                });
            }
            let pool = DbPool::new(config).await?;
            Ok(Arc::new(Repository::new(pool)))
        }
        "memory" => {
            tracing::warn!("Using in-memory metadata store, records are not persisted");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown database provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_create_memory_metadata_store() {
        let mut config = AppConfig::default().database;
        config.provider = "memory".to_string();

        let store = create_metadata_store(&config).await.unwrap();
        assert!(store.ping().await.is_ok());
        assert!(store.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_postgres_provider_requires_url() {
        let mut config = AppConfig::default().database;
        config.url = String::new();

        let result = create_metadata_store(&config).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_unknown_metadata_provider() {
        let mut config = AppConfig::default().database;
        config.provider = "mongodb".to_string();

        let result = create_metadata_store(&config).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
