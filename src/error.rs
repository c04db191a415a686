use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to start server: {0}")]
    StartServer(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("tenant context missing")]
    TenantContextMissing,

    #[error("unauthorized")]
    Unauthorized,

    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("participant {0} does not resolve in the target tenant")]
    InvalidParticipant(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::TenantContextMissing => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidParticipant(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Database(_)
            | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::TenantContextMissing => "TENANT_CONTEXT_MISSING",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::AccessDenied => "ACCESS_DENIED",
            AppError::NotFound => "NOT_FOUND",
            AppError::InvalidParticipant(_) => "INVALID_PARTICIPANT",
            AppError::Config(_) | AppError::StartServer(_) | AppError::Database(_)
            | AppError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Store and internal failures are logged here and not echoed to
        // the caller.
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                "internal server error".to_string()
            }
            AppError::Internal | AppError::Config(_) | AppError::StartServer(_) => {
                tracing::error!(error = %self, "internal failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::TenantContextMissing.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidParticipant(Uuid::nil()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = AppError::Config("secret dsn".into());
        // code is generic; display text for config errors is not sent to
        // clients (see IntoResponse)
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
