// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn product_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Product with ID '{}' not found", id))
    }

    pub fn notification_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Notification with ID '{}' not found", id))
    }

    pub fn update_conflict(id: &str, attempts: u32) -> Self {
        ApiError::Conflict(format!(
            "Product '{}' was modified concurrently; gave up after {} attempts",
            id, attempts
        ))
    }
}

/// SQLite reports lock contention as SQLITE_BUSY (5) or SQLITE_LOCKED (6),
/// possibly carrying an extended code in the upper bits.
pub fn is_write_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::product_not_found("x").error_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::ValidationError("bad".into()).error_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::update_conflict("x", 3).error_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::DatabaseError(sqlx::Error::RowNotFound).error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(!is_write_conflict(&sqlx::Error::RowNotFound));
        assert!(!is_write_conflict(&sqlx::Error::PoolTimedOut));
    }
}
