// src/models/notification.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub product_id: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification joined with the product it concerns. `product_name` is
/// `None` once the product has been deleted.
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct NotificationWithProduct {
    pub id: String,
    pub product_id: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub product_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationIdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}
