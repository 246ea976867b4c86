use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to HTTP callers. Anything raised by a downstream system is
/// translated into one of these before it leaves a service function.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn credentials() -> Self {
        AppError::Unauthorized("Could not validate credentials".into())
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        AppError::Internal(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Unauthorized(msg) => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": msg })),
            )
                .into_response(),
            AppError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(json!({
                    "detail": format!("Rate limit exceeded. Try again in {retry_after} seconds")
                })),
            )
                .into_response(),
            AppError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                (
                    status,
                    Json(json!({ "detail": "An unexpected error occurred." })),
                )
                    .into_response()
            }
            AppError::BadRequest(msg) | AppError::Conflict(msg) | AppError::NotFound(msg) => {
                (status, Json(json!({ "detail": msg }))).into_response()
            }
        }
    }
}

/// Failures reported by the repository layer.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint violated")]
    Conflict,
    #[error(transparent)]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => RepoError::Conflict,
            _ => RepoError::Db(err),
        }
    }
}
