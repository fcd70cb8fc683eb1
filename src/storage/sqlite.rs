use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::StorageConfig;

use super::{MIGRATION_001_KV_STORE, Storage, StorageError};

/// SQLite-backed key-value storage.
/// Exports are written as files into `export_dir`; imports read `import_source`.
pub struct SqliteStorage {
    pool: SqlitePool,
    export_dir: PathBuf,
    import_source: Option<PathBuf>,
}

impl SqliteStorage {
    /// Create a new storage with the given SQLite connection pool.
    pub fn new(pool: SqlitePool, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            export_dir: export_dir.into(),
            import_source: None,
        }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_path: &Path) -> Result<SqlitePool> {
        let url = format!("sqlite:{}?mode=rwc", database_path.display());
        SqlitePool::connect(&url)
            .await
            .context("Failed to connect to database")
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_KV_STORE)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Open (or create) the database described by `config` and migrate it.
    pub async fn init(config: &StorageConfig) -> Result<Self> {
        let pool = Self::connect(&config.database_path).await?;
        let storage = Self {
            import_source: config.import_source.clone(),
            ..Self::new(pool, config.export_dir.clone())
        };
        storage.migrate().await?;
        Ok(storage)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read key {}", key))?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write key {}", key))?;

        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    async fn download_file(&self, name: &str, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.export_dir.display()))?;

        let path = self.export_dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!(path = %path.display(), "wrote export file");
        Ok(())
    }

    async fn read_file(&self) -> Result<String> {
        let path = self
            .import_source
            .as_ref()
            .ok_or(StorageError::NoImportSource)?;

        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}
