// src/db.rs - Database setup and migrations

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;
use crate::config::DatabaseConfig;

pub async fn create_database_pool(db_config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database URL: {}", db_config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(db_config.busy_timeout));

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_config.url))?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Products. last_notified_quantity is the dedup marker for stock notifications.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            quantity INTEGER NOT NULL DEFAULT 0 CHECK(quantity >= 0),
            threshold INTEGER NOT NULL DEFAULT 0 CHECK(threshold >= 0),
            expired_date DATE,
            section TEXT NOT NULL DEFAULT 'A' CHECK(section IN ('A', 'B', 'C')),
            last_notified_quantity INTEGER,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Notifications reference products weakly: no foreign key, so they
    // survive product deletion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            message TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0 CHECK(read IN (0, 1)),
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id TEXT PRIMARY KEY,
            temperature REAL NOT NULL,
            humidity REAL NOT NULL CHECK(humidity >= 0 AND humidity <= 100),
            product_id TEXT,
            timestamp DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    migrate_existing_tables(pool).await?;

    let index_queries = [
        "CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_created_at ON notifications(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications(read)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_product_id ON notifications(product_id)",
        "CREATE INDEX IF NOT EXISTS idx_sensor_readings_timestamp ON sensor_readings(timestamp)",
    ];

    for query in index_queries.iter() {
        sqlx::query(query).execute(pool).await?;
    }

    Ok(())
}

// ==================== MIGRATION FOR EXISTING DATABASES ====================

/// Databases created before the dedup marker existed lack the column.
pub async fn migrate_existing_tables(pool: &SqlitePool) -> Result<()> {
    if !column_exists(pool, "products", "last_notified_quantity").await? {
        log::info!("Adding products.last_notified_quantity column");
        sqlx::query("ALTER TABLE products ADD COLUMN last_notified_quantity INTEGER")
            .execute(pool)
            .await?;
    }

    Ok(())
}

// ==================== UTILITY FUNCTIONS ====================

/// Check if a column exists in a table
pub async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let query = format!("SELECT COUNT(*) as count FROM pragma_table_info('{}') WHERE name = ?", table);
    let result: (i32,) = sqlx::query_as(&query)
        .bind(column)
        .fetch_one(pool)
        .await?;
    Ok(result.0 > 0)
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid in-memory url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("open in-memory database");
    run_migrations(&pool).await.expect("run migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        assert!(column_exists(&pool, "products", "last_notified_quantity").await.unwrap());
        assert!(column_exists(&pool, "notifications", "read").await.unwrap());
        assert!(!column_exists(&pool, "products", "nope").await.unwrap());
    }

    #[actix_rt::test]
    async fn test_legacy_products_table_gains_marker_column() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 0,
                threshold INTEGER NOT NULL DEFAULT 0,
                expired_date DATE,
                section TEXT NOT NULL DEFAULT 'A',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();
        assert!(column_exists(&pool, "products", "last_notified_quantity").await.unwrap());
    }

    #[actix_rt::test]
    async fn test_schema_rejects_negative_quantity() {
        let pool = memory_pool().await;
        let result = sqlx::query(
            "INSERT INTO products (id, name, quantity, threshold, section, created_at, updated_at)
             VALUES ('p1', 'Widget', -1, 0, 'A', datetime('now'), datetime('now'))",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
