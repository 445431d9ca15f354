// src/repositories/mod.rs
//! Table access for products, notifications and sensor readings

pub mod notification;
pub mod product;
pub mod sensor;

pub use notification::NotificationRepository;
pub use product::ProductRepository;
pub use sensor::SensorReadingRepository;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use crate::error::{ApiError, ApiResult};

/// Base trait for CRUD operations
#[async_trait]
pub trait CrudRepository<T, CreateDto>: Send + Sync
where
    T: Send + Unpin + for<'r> sqlx::FromRow<'r, SqliteRow>,
    CreateDto: Send,
{
    /// Table name in the database
    fn table_name(&self) -> &'static str;

    /// Human-readable entity name used in error messages
    fn entity_name(&self) -> &'static str;

    fn id_field(&self) -> &'static str {
        "id"
    }

    /// Newest-first ordering column
    fn default_sort_field(&self) -> &'static str {
        "created_at"
    }

    async fn create(&self, pool: &SqlitePool, data: CreateDto) -> ApiResult<T>;

    async fn get_by_id(&self, pool: &SqlitePool, id: &str) -> ApiResult<Option<T>> {
        let query = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result)
    }

    async fn delete(&self, pool: &SqlitePool, id: &str) -> ApiResult<()> {
        let query = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query(&query)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(self.entity_name()));
        }

        Ok(())
    }

    /// Most recent rows first, ties broken by insertion order
    async fn list_recent(&self, pool: &SqlitePool, limit: i64) -> ApiResult<Vec<T>> {
        let query = format!(
            "SELECT * FROM {} ORDER BY {} DESC, rowid DESC LIMIT ?",
            self.table_name(),
            self.default_sort_field()
        );

        let rows = sqlx::query_as::<_, T>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }
}

/// `?, ?, ?` for an IN clause of `count` items
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}
