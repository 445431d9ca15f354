// src/repositories/sensor.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use super::CrudRepository;
use crate::error::ApiResult;
use crate::models::{RecordReadingRequest, SensorReading};

pub struct SensorReadingRepository;

impl SensorReadingRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn latest(&self, pool: &SqlitePool) -> ApiResult<Option<SensorReading>> {
        Ok(self.list_recent(pool, 1).await?.into_iter().next())
    }

    /// Remove up to `chunk` readings taken before `cutoff`.
    pub async fn prune_before(&self, pool: &SqlitePool, cutoff: DateTime<Utc>, chunk: i64) -> ApiResult<u64> {
        let result = sqlx::query(
            "DELETE FROM sensor_readings
             WHERE id IN (
                 SELECT id FROM sensor_readings
                 WHERE timestamp < ?
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
impl CrudRepository<SensorReading, RecordReadingRequest> for SensorReadingRepository {
    fn table_name(&self) -> &'static str {
        "sensor_readings"
    }

    fn entity_name(&self) -> &'static str {
        "Sensor reading"
    }

    fn default_sort_field(&self) -> &'static str {
        "timestamp"
    }

    async fn create(&self, pool: &SqlitePool, data: RecordReadingRequest) -> ApiResult<SensorReading> {
        let reading = SensorReading {
            id: Uuid::new_v4().to_string(),
            temperature: data.temperature,
            humidity: data.humidity,
            product_id: data.product_id,
            timestamp: data.timestamp.unwrap_or_else(Utc::now),
        };

        sqlx::query(
            "INSERT INTO sensor_readings (id, temperature, humidity, product_id, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&reading.id)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(&reading.product_id)
        .bind(reading.timestamp)
        .execute(pool)
        .await?;

        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::Duration;

    fn reading_at(temperature: f64, timestamp: DateTime<Utc>) -> RecordReadingRequest {
        RecordReadingRequest {
            temperature,
            humidity: 50.0,
            product_id: None,
            timestamp: Some(timestamp),
        }
    }

    #[actix_rt::test]
    async fn test_recent_readings_by_timestamp() {
        let pool = memory_pool().await;
        let repo = SensorReadingRepository::new();
        let now = Utc::now();

        // Inserted out of order on purpose
        repo.create(&pool, reading_at(20.0, now - Duration::minutes(5))).await.unwrap();
        repo.create(&pool, reading_at(22.0, now)).await.unwrap();
        repo.create(&pool, reading_at(21.0, now - Duration::minutes(1))).await.unwrap();

        let recent = repo.list_recent(&pool, 10).await.unwrap();
        let temps: Vec<f64> = recent.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![22.0, 21.0, 20.0]);

        let latest = repo.latest(&pool).await.unwrap().unwrap();
        assert_eq!(latest.temperature, 22.0);
    }

    #[actix_rt::test]
    async fn test_latest_on_empty_table() {
        let pool = memory_pool().await;
        assert!(SensorReadingRepository::new().latest(&pool).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_prune_before_cutoff() {
        let pool = memory_pool().await;
        let repo = SensorReadingRepository::new();
        let now = Utc::now();
        repo.create(&pool, reading_at(18.0, now - Duration::days(40))).await.unwrap();
        repo.create(&pool, reading_at(19.0, now - Duration::days(31))).await.unwrap();
        repo.create(&pool, reading_at(20.0, now)).await.unwrap();

        let pruned = repo.prune_before(&pool, now - Duration::days(30), 1000).await.unwrap();
        assert_eq!(pruned, 2);
        assert_eq!(repo.list_recent(&pool, 10).await.unwrap().len(), 1);
    }
}
