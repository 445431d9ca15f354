// src/models/mod.rs

pub mod notification;
pub mod product;
pub mod sensor;

pub use notification::*;
pub use product::*;
pub use sensor::*;

use serde::Serialize;

// ==================== COMMON / SHARED ====================

/// Summary counters for the dashboard
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub low_stock_products: i64,
    pub unread_notifications: i64,
    pub latest_reading: Option<SensorReading>,
}
