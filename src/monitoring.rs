// src/monitoring.rs
use actix_web::{HttpResponse, web};
use serde::Serialize;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use tokio::time::{interval, sleep, Duration};
use crate::config::MaintenanceConfig;
use crate::repositories::{NotificationRepository, SensorReadingRepository};
use crate::AppState;

const PRUNE_CHUNK: i64 = 1000;

#[derive(Debug, Default)]
pub struct Metrics {
    pub request_count: AtomicU64,
    pub error_count: AtomicU64,
    pub notifications_emitted: AtomicU64,
    pub updates_suppressed: AtomicU64,
    pub update_conflicts: AtomicU64,
    pub response_times: std::sync::Mutex<Vec<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.updates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.update_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, time_ms: u64) {
        if let Ok(mut times) = self.response_times.lock() {
            times.push(time_ms);
            if times.len() > 1000 {
                times.remove(0);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsResponse {
        let avg_response_time_ms = match self.response_times.lock() {
            Ok(times) if !times.is_empty() => times.iter().sum::<u64>() as f64 / times.len() as f64,
            _ => 0.0,
        };

        MetricsResponse {
            requests_total: self.request_count.load(Ordering::Relaxed),
            errors_total: self.error_count.load(Ordering::Relaxed),
            avg_response_time_ms,
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
            updates_suppressed: self.updates_suppressed.load(Ordering::Relaxed),
            update_conflicts: self.update_conflicts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_response_time_ms: f64,
    pub notifications_emitted: u64,
    pub updates_suppressed: u64,
    pub update_conflicts: u64,
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readiness_check(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(&app_state.db_pool).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "database": "connected"
        })),
        Err(e) => {
            log::warn!("Readiness check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "not ready",
                "database": "disconnected"
            }))
        }
    }
}

pub async fn metrics_endpoint(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.metrics.snapshot())
}

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> actix_web::dev::Transform<S, actix_web::dev::ServiceRequest> for RequestLogger
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> actix_web::dev::Service<actix_web::dev::ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: actix_web::dev::ServiceRequest) -> Self::Future {
        let start_time = std::time::Instant::now();
        let metrics = self.metrics.clone();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.increment_requests();
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            metrics.record_response_time(elapsed);

            match res {
                Ok(ref response) if response.status().is_client_error() || response.status().is_server_error() => {
                    metrics.increment_errors();
                }
                Err(_) => metrics.increment_errors(),
                _ => {}
            }
            res
        })
    }
}

// ==================== MAINTENANCE ====================

pub async fn start_maintenance_tasks(pool: SqlitePool, config: MaintenanceConfig) {
    if !config.enabled {
        log::info!("Maintenance tasks disabled");
        return;
    }

    let mut interval = interval(Duration::from_secs(config.interval_minutes.max(1) * 60));

    loop {
        interval.tick().await;
        run_maintenance(&pool, &config).await;
    }
}

pub async fn run_maintenance(pool: &SqlitePool, config: &MaintenanceConfig) {
    let sensors = SensorReadingRepository::new();
    let cutoff = Utc::now() - ChronoDuration::days(config.sensor_retention_days);
    let mut total_deleted = 0;

    loop {
        match sensors.prune_before(pool, cutoff, PRUNE_CHUNK).await {
            Ok(count) => {
                total_deleted += count;
                if count < PRUNE_CHUNK as u64 { break; }
                sleep(Duration::from_millis(50)).await;
            }
            Err(e) => {
                log::error!("Failed to prune sensor readings chunk: {}", e);
                break;
            }
        }
    }
    if total_deleted > 0 {
        log::info!("Pruned {} sensor readings older than {} days", total_deleted, config.sensor_retention_days);
    }

    if config.read_notification_retention_days == 0 {
        return;
    }

    let notifications = NotificationRepository::new();
    let cutoff = Utc::now() - ChronoDuration::days(config.read_notification_retention_days);
    let mut total_deleted = 0;

    loop {
        match notifications.prune_read_before(pool, cutoff, PRUNE_CHUNK).await {
            Ok(count) => {
                total_deleted += count;
                if count < PRUNE_CHUNK as u64 { break; }
                sleep(Duration::from_millis(50)).await;
            }
            Err(e) => {
                log::error!("Failed to prune read notifications chunk: {}", e);
                break;
            }
        }
    }
    if total_deleted > 0 {
        log::info!(
            "Pruned {} read notifications older than {} days",
            total_deleted, config.read_notification_retention_days
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::{NewNotification, RecordReadingRequest};
    use crate::repositories::CrudRepository;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();
        metrics.increment_requests();
        metrics.increment_requests();
        metrics.increment_errors();
        metrics.record_response_time(10);
        metrics.record_response_time(30);
        metrics.record_notification();
        metrics.record_suppressed();
        metrics.record_conflict();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.avg_response_time_ms, 20.0);
        assert_eq!(snapshot.notifications_emitted, 1);
        assert_eq!(snapshot.updates_suppressed, 1);
        assert_eq!(snapshot.update_conflicts, 1);
    }

    #[test]
    fn test_response_time_window_is_bounded() {
        let metrics = Metrics::new();
        for i in 0..1500 {
            metrics.record_response_time(i);
        }
        assert_eq!(metrics.response_times.lock().unwrap().len(), 1000);
    }

    #[actix_rt::test]
    async fn test_run_maintenance_respects_retention() {
        let pool = memory_pool().await;
        let sensors = SensorReadingRepository::new();
        let notifications = NotificationRepository::new();

        sensors
            .create(&pool, RecordReadingRequest {
                temperature: 20.0,
                humidity: 40.0,
                product_id: None,
                timestamp: Some(Utc::now() - ChronoDuration::days(45)),
            })
            .await
            .unwrap();
        sensors
            .create(&pool, RecordReadingRequest {
                temperature: 21.0,
                humidity: 41.0,
                product_id: None,
                timestamp: None,
            })
            .await
            .unwrap();
        let n = notifications
            .create(&pool, NewNotification { product_id: "p1".into(), message: "m".into() })
            .await
            .unwrap();
        notifications.mark_read(&pool, &n.id).await.unwrap();

        // Read notifications are kept when retention is 0
        let config = MaintenanceConfig::default();
        run_maintenance(&pool, &config).await;

        assert_eq!(sensors.list_recent(&pool, 10).await.unwrap().len(), 1);
        assert_eq!(notifications.list_with_products(&pool, 10).await.unwrap().len(), 1);
    }
}
