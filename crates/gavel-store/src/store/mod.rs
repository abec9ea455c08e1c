//! SQLite-backed club store.
//!
//! Split into focused submodules:
//! - `members`: roster rows and notification preferences
//! - `attendance`: attendance records and reports

mod attendance;
mod members;

pub use members::{MemberProfile, OptChannel};

use gavel_core::config::{shellexpand, StoreConfig};
use gavel_core::error::GavelError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// Persistent club store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(config: &StoreConfig) -> Result<Self, GavelError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GavelError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| GavelError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| GavelError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Club store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), GavelError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| GavelError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        GavelError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| GavelError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| GavelError::Store(format!("failed to record migration {name}: {e}")))?;
        }
        Ok(())
    }

    /// Number of roster rows.
    pub async fn member_count(&self) -> Result<i64, GavelError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("count failed: {e}")))?;
        Ok(n)
    }

    /// Number of attendance rows.
    pub async fn attendance_count(&self) -> Result<i64, GavelError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendance")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("count failed: {e}")))?;
        Ok(n)
    }

    /// Run an arbitrary query and stringify the result grid. The caller is
    /// responsible for restricting what gets here (the `sql` command only
    /// forwards vetted SELECT statements).
    pub async fn raw_select(
        &self,
        query: &str,
    ) -> Result<(Vec<String>, Vec<Vec<String>>), GavelError> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rendered = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| render_value(row, i)).collect())
            .collect();

        Ok((columns, rendered))
    }
}

/// Best-effort stringification of a dynamically-typed SQLite value.
fn render_value(row: &SqliteRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map_or_else(|| "NULL".to_string(), |n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map_or_else(|| "NULL".to_string(), |n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map_or_else(|| "NULL".to_string(), |b| format!("<{} bytes>", b.len()));
    }
    "?".to_string()
}

#[cfg(test)]
mod tests;
