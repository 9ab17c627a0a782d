//! SQLite-backed key-value storage for the local gateway.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{GatewayResult, KeyValueStorage};

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

/// Key-value storage kept in a single SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database file at `db_path`.
    pub async fn open(db_path: &Path) -> GatewayResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> GatewayResult<Self> {
        // Each connection to :memory: is its own database, so keep exactly one
        // alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> GatewayResult<Self> {
        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        tracing::debug!("Key-value schema ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> GatewayResult<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use entities::RecipeDraft;

    use super::*;
    use crate::{LocalGateway, RecipeGateway};

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(storage.get("recipes").await.unwrap(), None);

        storage.set("recipes", "[]").await.unwrap();
        storage.set("recipes", "[1]").await.unwrap();
        assert_eq!(storage.get("recipes").await.unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book").join("recipes.db");

        {
            let gateway = LocalGateway::new(SqliteStorage::open(&path).await.unwrap());
            let draft = RecipeDraft::new("Curry", "https://example.com/curry")
                .validate(Utc::now(), None)
                .unwrap();
            gateway.insert(draft).await.unwrap();
        }

        let gateway = LocalGateway::new(SqliteStorage::open(&path).await.unwrap());
        let recipes = gateway.fetch_all().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Curry");
    }
}
