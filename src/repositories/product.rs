// src/repositories/product.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use super::CrudRepository;
use crate::error::ApiResult;
use crate::models::{Product, ProductRequest};

pub struct ProductRepository;

impl ProductRepository {
    pub fn new() -> Self {
        Self
    }

    /// Take the database write lock for this transaction with a no-op write.
    /// Writers then queue on the busy timeout instead of failing when a read
    /// transaction tries to upgrade. Returns false if the product is absent.
    pub async fn claim_for_update(conn: &mut SqliteConnection, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("UPDATE products SET id = id WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Read a product inside an open transaction
    pub async fn fetch_in_tx(conn: &mut SqliteConnection, id: &str) -> ApiResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(product)
    }

    /// Write every form field plus the dedup marker, but only while the row
    /// still holds the `(quantity, last_notified_quantity)` pair read as
    /// `current`. Returns false when another writer got there first.
    pub async fn update_if_unchanged(
        conn: &mut SqliteConnection,
        current: &Product,
        data: &ProductRequest,
        last_notified_quantity: Option<i64>,
        now: DateTime<Utc>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            r#"UPDATE products SET
                name = ?,
                quantity = ?,
                threshold = ?,
                expired_date = ?,
                section = ?,
                last_notified_quantity = ?,
                updated_at = ?
            WHERE id = ? AND quantity = ? AND last_notified_quantity IS ?"#,
        )
        .bind(&data.name)
        .bind(data.quantity)
        .bind(data.threshold)
        .bind(data.expired_date)
        .bind(data.section_or_default())
        .bind(last_notified_quantity)
        .bind(now)
        .bind(&current.id)
        .bind(current.quantity)
        .bind(current.last_notified_quantity)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_low_stock(&self, pool: &SqlitePool) -> ApiResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE quantity < threshold ORDER BY quantity ASC, name ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(products)
    }

    pub async fn count(&self, pool: &SqlitePool) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await?;
        Ok(total)
    }

    pub async fn count_low_stock(&self, pool: &SqlitePool) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE quantity < threshold")
            .fetch_one(pool)
            .await?;
        Ok(total)
    }
}

#[async_trait]
impl CrudRepository<Product, ProductRequest> for ProductRepository {
    fn table_name(&self) -> &'static str {
        "products"
    }

    fn entity_name(&self) -> &'static str {
        "Product"
    }

    /// New products start without a dedup marker.
    async fn create(&self, pool: &SqlitePool, data: ProductRequest) -> ApiResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            section: data.section_or_default(),
            name: data.name,
            quantity: data.quantity,
            threshold: data.threshold,
            expired_date: data.expired_date,
            last_notified_quantity: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO products
               (id, name, quantity, threshold, expired_date, section, last_notified_quantity, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)"#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.quantity)
        .bind(product.threshold)
        .bind(product.expired_date)
        .bind(&product.section)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(pool)
        .await?;

        Ok(product)
    }
}
