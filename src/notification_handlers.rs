// src/notification_handlers.rs
use actix_web::{http::header, web, HttpResponse};
use futures_util::stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, LimitQuery};
use crate::models::{NotificationIdsRequest, UnreadCount};
use crate::repositories::{CrudRepository, NotificationRepository};

#[derive(Debug, Serialize)]
pub struct AffectedCount {
    pub affected: u64,
}

pub async fn get_notifications(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let settings = &app_state.config.notifications;
    let limit = query.resolve(settings.list_limit, settings.max_list_limit);

    let notifications = NotificationRepository::new()
        .list_with_products(&app_state.db_pool, limit)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

pub async fn get_unread_count(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let unread = NotificationRepository::new().unread_count(&app_state.db_pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UnreadCount { unread })))
}

pub async fn mark_notification_read(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let notification = NotificationRepository::new()
        .mark_read(&app_state.db_pool, &id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(notification)))
}

pub async fn mark_all_read(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let affected = NotificationRepository::new().mark_all_read(&app_state.db_pool).await?;
    log::info!("Marked {} notifications as read", affected);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        AffectedCount { affected },
        format!("{} notifications marked as read", affected),
    )))
}

pub async fn delete_notification(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    NotificationRepository::new()
        .delete(&app_state.db_pool, &id)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::notification_not_found(&id),
            other => other,
        })?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Notification deleted".to_string(),
    )))
}

pub async fn delete_notifications(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<NotificationIdsRequest>,
) -> ApiResult<HttpResponse> {
    if body.ids.is_empty() {
        return Err(ApiError::bad_request("No notification IDs provided"));
    }

    let affected = NotificationRepository::new()
        .delete_many(&app_state.db_pool, &body.ids)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        AffectedCount { affected },
        format!("{} notifications deleted", affected),
    )))
}

pub async fn delete_all_notifications(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let affected = NotificationRepository::new().delete_all(&app_state.db_pool).await?;
    log::info!("Deleted all {} notifications", affected);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        AffectedCount { affected },
        format!("{} notifications deleted", affected),
    )))
}

/// Server-Sent Events: one `notification` event per committed notification.
/// A `lagged` event tells a slow client it missed some and should refetch.
pub async fn notification_stream(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    let receiver = app_state.notifier.subscribe();

    let events = stream::unfold(receiver, |mut rx| async move {
        let frame = match rx.recv().await {
            Ok(notification) => match serde_json::to_string(&notification) {
                Ok(payload) => format!("event: notification\ndata: {}\n\n", payload),
                Err(e) => {
                    log::error!("Failed to serialize notification {}: {}", notification.id, e);
                    return None;
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Notification stream subscriber lagged by {} events", skipped);
                format!("event: lagged\ndata: {}\n\n", skipped)
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok::<_, actix_web::Error>(web::Bytes::from(frame)), rx))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(header::ContentEncoding::Identity)
        .streaming(events)
}
