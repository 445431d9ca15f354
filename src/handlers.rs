// src/handlers.rs
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::DashboardStats;
use crate::repositories::{NotificationRepository, ProductRepository, SensorReadingRepository};

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// Requested limit, or `default`, clamped to `1..=max`.
    pub fn resolve(&self, default: i64, max: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, max.max(1))
    }
}

/// Bodies that fail to deserialize (wrong types, missing fields, bad JSON)
/// are reported as validation errors.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected JSON payload: {}", err);
    let message = match &err {
        JsonPayloadError::Deserialize(e) => e.to_string(),
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        other => other.to_string(),
    };
    ApiError::ValidationError(message).into()
}

// ==================== DASHBOARD ====================

pub async fn get_dashboard_stats(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;
    let products = ProductRepository::new();

    let stats = DashboardStats {
        total_products: products.count(pool).await?,
        low_stock_products: products.count_low_stock(pool).await?,
        unread_notifications: NotificationRepository::new().unread_count(pool).await?,
        latest_reading: SensorReadingRepository::new().latest(pool).await?,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_resolution() {
        assert_eq!(LimitQuery { limit: None }.resolve(50, 200), 50);
        assert_eq!(LimitQuery { limit: Some(10) }.resolve(50, 200), 10);
        assert_eq!(LimitQuery { limit: Some(1000) }.resolve(50, 200), 200);
        assert_eq!(LimitQuery { limit: Some(0) }.resolve(50, 200), 1);
        assert_eq!(LimitQuery { limit: Some(-4) }.resolve(50, 200), 1);
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::success_with_message(3, "done".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 3, "message": "done"}));
    }
}
