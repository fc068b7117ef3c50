use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use navigator_core::error::CoreError;
use navigator_forge::ForgeApiError;
use navigator_pipeline::InterruptError;
use serde::Serialize;

/// Everything a handler can fail with. Rendered as `{ "error", "code" }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The generation backend failed or could not be reached.
    #[error("Backend error: {0}")]
    Backend(#[from] ForgeApiError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<InterruptError> for AppError {
    fn from(err: InterruptError) -> Self {
        match err {
            InterruptError::NotFound => AppError::Core(CoreError::NotFound {
                entity: "Task",
                id: String::new(),
            }),
            InterruptError::Unauthorized => {
                AppError::Core(CoreError::Forbidden("Unauthorized".into()))
            }
            InterruptError::Backend(e) => AppError::Backend(e),
            InterruptError::Storage(e) => AppError::Core(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Message shown instead of storage or internal details.
const INTERNAL_MESSAGE: &str = "An internal error occurred";

type Classified = (StatusCode, &'static str, String);

fn internal(detail: &dyn std::fmt::Display) -> Classified {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

fn classify_core(err: &CoreError) -> Classified {
    match err {
        // Task and image lookups report the entity alone.
        CoreError::NotFound { entity, id } if id.is_empty() => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{entity} not found"))
        }
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Storage(msg) | CoreError::Internal(msg) => internal(msg),
    }
}

/// `RowNotFound` is a 404 and unique violations are a 409. Anything else
/// is sanitized.
fn classify_sqlx(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!(
                "Duplicate value violates unique constraint: {}",
                db_err.constraint().unwrap_or("unknown")
            ),
        ),
        other => internal(other),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Database(err) => classify_sqlx(err),
            AppError::Backend(err) => {
                tracing::error!(error = %err, "Forge request failed");
                (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", err.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        (status, Json(ErrorBody { error, code })).into_response()
    }
}
