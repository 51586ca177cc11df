//! SQLite record store.
//!
//! Uses a single SQLite database file with two tables:
//! - `bindings` — one ledger id per user, overwritable
//! - `measurements` — user-defined measurement definitions, ordered by
//!   insertion (creation order fixes prompt order and column order)

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tallygram_core::error::StoreError;
use tallygram_core::measurement::{Measurement, MeasurementKind, UserId};
use tallygram_core::store::RecordStore;
use tracing::{debug, info};

/// A production SQLite record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite record store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations. Idempotent.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bindings (
                user_id    TEXT PRIMARY KEY,
                ledger_id  TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("bindings table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS measurements (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                name       TEXT NOT NULL,
                kind       TEXT NOT NULL,
                min        INTEGER NOT NULL DEFAULT 0,
                max        INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("measurements table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_measurements_user ON measurements(user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("measurements index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_measurement(row: &sqlx::sqlite::SqliteRow) -> Result<Measurement, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?;
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| StoreError::QueryFailed(format!("kind column: {e}")))?;
        let min: i64 = row
            .try_get("min")
            .map_err(|e| StoreError::QueryFailed(format!("min column: {e}")))?;
        let max: i64 = row
            .try_get("max")
            .map_err(|e| StoreError::QueryFailed(format!("max column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let kind = MeasurementKind::parse(&kind_str)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown kind '{kind_str}'")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Measurement {
            id,
            name,
            kind,
            min,
            max,
            created_at,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_binding(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT ledger_id FROM bindings WHERE user_id = ?1")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_binding: {e}")))?;

        match row {
            Some(r) => {
                let ledger_id: String = r
                    .try_get("ledger_id")
                    .map_err(|e| StoreError::QueryFailed(format!("ledger_id column: {e}")))?;
                Ok(Some(ledger_id))
            }
            None => Ok(None),
        }
    }

    async fn set_binding(&self, user_id: &UserId, ledger_id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO bindings (user_id, ledger_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                ledger_id = excluded.ledger_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user_id.0)
        .bind(ledger_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("set_binding: {e}")))?;

        debug!(user_id = %user_id, ledger_id = %ledger_id, "Binding stored");
        Ok(())
    }

    async fn all_bindings(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows = sqlx::query("SELECT user_id, ledger_id FROM bindings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("all_bindings: {e}")))?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let user_id: String = row
                .try_get("user_id")
                .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
            let ledger_id: String = row
                .try_get("ledger_id")
                .map_err(|e| StoreError::QueryFailed(format!("ledger_id column: {e}")))?;
            map.insert(user_id, ledger_id);
        }
        Ok(map)
    }

    async fn add_measurement(
        &self,
        user_id: &UserId,
        name: &str,
        kind: MeasurementKind,
        min: i64,
        max: i64,
    ) -> Result<Measurement, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO measurements (user_id, name, kind, min, max, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user_id.0)
        .bind(name)
        .bind(kind.as_str())
        .bind(min)
        .bind(max)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("add_measurement: {e}")))?;

        debug!(user_id = %user_id, name = %name, "Measurement stored");
        Ok(Measurement {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            kind,
            min,
            max,
            created_at,
        })
    }

    async fn list_measurements(&self, user_id: &UserId) -> Result<Vec<Measurement>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, kind, min, max, created_at FROM measurements
             WHERE user_id = ?1 ORDER BY id ASC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list_measurements: {e}")))?;

        rows.iter().map(Self::row_to_measurement).collect()
    }

    async fn remove_measurement(&self, user_id: &UserId, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM measurements WHERE user_id = ?1 AND id = ?2")
            .bind(&user_id.0)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("remove_measurement: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
