// src/sensor_handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::error::ApiResult;
use crate::handlers::{ApiResponse, LimitQuery};
use crate::models::{GaugeReading, RecordReadingRequest};
use crate::repositories::{CrudRepository, SensorReadingRepository};

const DEFAULT_READING_LIMIT: i64 = 10;
const MAX_READING_LIMIT: i64 = 500;

pub async fn get_readings(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.resolve(DEFAULT_READING_LIMIT, MAX_READING_LIMIT);
    let readings = SensorReadingRepository::new()
        .list_recent(&app_state.db_pool, limit)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(readings)))
}

/// `data` is null until the first reading arrives.
pub async fn get_latest_reading(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let latest = SensorReadingRepository::new()
        .latest(&app_state.db_pool)
        .await?
        .map(GaugeReading::from);

    Ok(HttpResponse::Ok().json(ApiResponse {
        success: true,
        data: latest,
        message: None,
    }))
}

pub async fn record_reading(
    app_state: web::Data<Arc<AppState>>,
    reading: web::Json<RecordReadingRequest>,
) -> ApiResult<HttpResponse> {
    reading.validate()?;

    let created = SensorReadingRepository::new()
        .create(&app_state.db_pool, reading.into_inner())
        .await?;
    log::debug!("Recorded sensor reading {}: {} °C, {} %", created.id, created.temperature, created.humidity);

    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}
