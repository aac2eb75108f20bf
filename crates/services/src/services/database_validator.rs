//! Startup validation that the database schema is in place.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

const REQUIRED_TABLES: &[&str] = &["profiles", "projects", "files"];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database not initialized")]
    NotInitialized,
    #[error("missing tables: {0}")]
    MissingTables(String),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Verify that migrations ran and every table the application reads
    /// exists.
    pub async fn validate(&self) -> Result<(), DatabaseValidationError> {
        let initialized = self.table_exists("_sqlx_migrations").await?;
        if !initialized {
            return Err(DatabaseValidationError::NotInitialized);
        }

        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing.push(*table);
            }
        }
        if !missing.is_empty() {
            return Err(DatabaseValidationError::MissingTables(missing.join(", ")));
        }

        let migrations_applied: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?;

        info!(migrations_applied, "database validation complete");
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DatabaseValidationError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = $1",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}
