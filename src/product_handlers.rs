// src/product_handlers.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, LimitQuery};
use crate::models::{Notification, ProductRequest, ProductResponse};
use crate::repositories::{CrudRepository, ProductRepository};

const DEFAULT_PRODUCT_LIMIT: i64 = 500;
const MAX_PRODUCT_LIMIT: i64 = 5000;

#[derive(Debug, Serialize)]
pub struct ProductUpdateResponse {
    pub product: ProductResponse,
    /// Present only when the edit produced a stock notification
    pub notification: Option<Notification>,
}

pub async fn get_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.resolve(DEFAULT_PRODUCT_LIMIT, MAX_PRODUCT_LIMIT);
    let products: Vec<ProductResponse> = ProductRepository::new()
        .list_recent(&app_state.db_pool, limit)
        .await?
        .into_iter()
        .map(ProductResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(products)))
}

pub async fn get_low_stock_products(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let products: Vec<ProductResponse> = ProductRepository::new()
        .list_low_stock(&app_state.db_pool)
        .await?
        .into_iter()
        .map(ProductResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(products)))
}

pub async fn get_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let product = ProductRepository::new()
        .get_by_id(&app_state.db_pool, &id)
        .await?
        .ok_or_else(|| ApiError::product_not_found(&id))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ProductResponse::from(product))))
}

pub async fn create_product(
    app_state: web::Data<Arc<AppState>>,
    product: web::Json<ProductRequest>,
) -> ApiResult<HttpResponse> {
    let created = app_state.notifier.create_product(product.into_inner()).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        ProductResponse::from(created),
        "Product created successfully".to_string(),
    )))
}

pub async fn update_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    update: web::Json<ProductRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let outcome = app_state
        .notifier
        .apply_quantity_update(&id, update.into_inner())
        .await?;

    let message = match &outcome.notification {
        Some(notification) => notification.message.clone(),
        None => "Product updated successfully".to_string(),
    };

    let response = ProductUpdateResponse {
        product: ProductResponse::from(outcome.product),
        notification: outcome.notification,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(response, message)))
}

pub async fn delete_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.notifier.delete_product(&id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Product deleted successfully".to_string(),
    )))
}
