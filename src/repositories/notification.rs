// src/repositories/notification.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use super::{placeholders, CrudRepository};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewNotification, Notification, NotificationWithProduct};

pub struct NotificationRepository;

impl NotificationRepository {
    pub fn new() -> Self {
        Self
    }

    /// Insert on any connection, including one inside a transaction.
    pub async fn insert(conn: &mut SqliteConnection, data: &NewNotification) -> ApiResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            product_id: data.product_id.clone(),
            message: data.message.clone(),
            read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO notifications (id, product_id, message, read, created_at)
               VALUES (?, ?, ?, 0, ?)"#,
        )
        .bind(&notification.id)
        .bind(&notification.product_id)
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(conn)
        .await?;

        Ok(notification)
    }

    pub async fn list_with_products(&self, pool: &SqlitePool, limit: i64) -> ApiResult<Vec<NotificationWithProduct>> {
        let rows = sqlx::query_as::<_, NotificationWithProduct>(
            r#"SELECT n.id, n.product_id, n.message, n.read, n.created_at, p.name AS product_name
               FROM notifications n
               LEFT JOIN products p ON p.id = n.product_id
               ORDER BY n.created_at DESC, n.rowid DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Idempotent: marking an already-read notification succeeds unchanged.
    pub async fn mark_read(&self, pool: &SqlitePool, id: &str) -> ApiResult<Notification> {
        sqlx::query_as::<_, Notification>("UPDATE notifications SET read = 1 WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::notification_not_found(id))
    }

    /// Single statement, so rows inserted after it starts stay unread.
    pub async fn mark_all_read(&self, pool: &SqlitePool) -> ApiResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE read = 0")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_many(&self, pool: &SqlitePool, ids: &[String]) -> ApiResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let query = format!("DELETE FROM notifications WHERE id IN ({})", placeholders(ids.len()));
        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(id);
        }

        let result = q.execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all(&self, pool: &SqlitePool) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM notifications")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, pool: &SqlitePool) -> ApiResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE read = 0")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Remove up to `chunk` read notifications created before `cutoff`.
    pub async fn prune_read_before(&self, pool: &SqlitePool, cutoff: DateTime<Utc>, chunk: i64) -> ApiResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications
             WHERE id IN (
                 SELECT id FROM notifications
                 WHERE read = 1 AND created_at < ?
                 LIMIT ?
             )",
        )
        .bind(cutoff)
        .bind(chunk)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CrudRepository<Notification, NewNotification> for NotificationRepository {
    fn table_name(&self) -> &'static str {
        "notifications"
    }

    fn entity_name(&self) -> &'static str {
        "Notification"
    }

    async fn create(&self, pool: &SqlitePool, data: NewNotification) -> ApiResult<Notification> {
        let mut conn = pool.acquire().await?;
        Self::insert(&mut conn, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::ProductRequest;
    use crate::repositories::ProductRepository;

    async fn seed(pool: &SqlitePool, product_id: &str, count: usize) -> Vec<Notification> {
        let repo = NotificationRepository::new();
        let mut created = Vec::new();
        for i in 0..count {
            let n = repo
                .create(pool, NewNotification {
                    product_id: product_id.to_string(),
                    message: format!("message {}", i),
                })
                .await
                .unwrap();
            created.push(n);
        }
        created
    }

    #[actix_rt::test]
    async fn test_list_is_newest_first_and_limited() {
        let pool = memory_pool().await;
        seed(&pool, "p1", 5).await;

        let repo = NotificationRepository::new();
        let rows = repo.list_with_products(&pool, 3).await.unwrap();
        let messages: Vec<_> = rows.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["message 4", "message 3", "message 2"]);
        assert!(rows.iter().all(|n| !n.read));
    }

    #[actix_rt::test]
    async fn test_mark_read_is_idempotent() {
        let pool = memory_pool().await;
        let created = seed(&pool, "p1", 1).await;
        let repo = NotificationRepository::new();

        let first = repo.mark_read(&pool, &created[0].id).await.unwrap();
        assert!(first.read);
        let second = repo.mark_read(&pool, &created[0].id).await.unwrap();
        assert_eq!(first, second);

        let missing = repo.mark_read(&pool, "missing").await.unwrap_err();
        assert!(matches!(missing, ApiError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn test_mark_all_read_with_some_already_read() {
        let pool = memory_pool().await;
        let created = seed(&pool, "p1", 5).await;
        let repo = NotificationRepository::new();
        repo.mark_read(&pool, &created[0].id).await.unwrap();
        repo.mark_read(&pool, &created[3].id).await.unwrap();

        assert_eq!(repo.mark_all_read(&pool).await.unwrap(), 3);
        assert_eq!(repo.unread_count(&pool).await.unwrap(), 0);

        // Second call is a no-op
        assert_eq!(repo.mark_all_read(&pool).await.unwrap(), 0);
        let rows = repo.list_with_products(&pool, 50).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|n| n.read));
    }

    #[actix_rt::test]
    async fn test_delete_operations() {
        let pool = memory_pool().await;
        let created = seed(&pool, "p1", 4).await;
        let repo = NotificationRepository::new();

        repo.delete(&pool, &created[0].id).await.unwrap();
        assert!(repo.delete(&pool, &created[0].id).await.is_err());

        let ids = vec![created[1].id.clone(), created[2].id.clone(), "missing".to_string()];
        assert_eq!(repo.delete_many(&pool, &ids).await.unwrap(), 2);
        assert_eq!(repo.delete_many(&pool, &[]).await.unwrap(), 0);

        assert_eq!(repo.delete_all(&pool).await.unwrap(), 1);
        assert!(repo.list_with_products(&pool, 50).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_deleted_product_leaves_name_absent() {
        let pool = memory_pool().await;
        let products = ProductRepository::new();
        let product = products
            .create(&pool, ProductRequest {
                name: "Widget".into(),
                quantity: 1,
                threshold: 0,
                expired_date: None,
                section: None,
            })
            .await
            .unwrap();
        seed(&pool, &product.id, 1).await;

        let repo = NotificationRepository::new();
        let before = repo.list_with_products(&pool, 50).await.unwrap();
        assert_eq!(before[0].product_name.as_deref(), Some("Widget"));

        products.delete(&pool, &product.id).await.unwrap();

        let after = repo.list_with_products(&pool, 50).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].product_id, product.id);
        assert_eq!(after[0].product_name, None);
    }

    #[actix_rt::test]
    async fn test_prune_only_touches_old_read_rows() {
        let pool = memory_pool().await;
        let created = seed(&pool, "p1", 3).await;
        let repo = NotificationRepository::new();
        repo.mark_read(&pool, &created[0].id).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(repo.prune_read_before(&pool, cutoff, 1000).await.unwrap(), 1);
        assert_eq!(repo.unread_count(&pool).await.unwrap(), 2);
    }
}
