use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use utoipa::ToSchema;

use crate::core::aliases::DieselError;

/// Error taxonomy shared by every controller. Store/internal failures are
/// logged and surfaced as an opaque 500; everything else carries a message
/// the caller may render.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    ForbiddenResource(String),
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Conflict(info.message().to_string())
            }
            other => AppError::Other(other.into()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::ForbiddenResource(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unsupported(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone()),
            AppError::Other(err) => {
                tracing::error!("Internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status_code,
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}

/// Standard success envelope returned by every controller.
#[derive(Serialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub status: &'static str,
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T, M> StdResponse<T, M> {
    pub fn ok(data: T, message: M) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: Some(message),
        }
    }
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_keeps_the_status_message_shape() {
        let body = serde_json::to_value(StdResponse::ok(41, "It worked")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status": "success",
                "data": 41,
                "message": "It worked",
            })
        );
    }

    #[test]
    fn error_body_is_marked_as_error() {
        let body = serde_json::to_value(ErrorBody {
            status: "error",
            message: "Cart is empty".into(),
        })
        .unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Cart is empty");
    }

    #[test]
    fn store_errors_map_into_the_taxonomy() {
        assert!(matches!(
            AppError::from(DieselError::NotFound),
            AppError::NotFound
        ));

        let duplicate = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        assert!(matches!(AppError::from(duplicate), AppError::Conflict(_)));
    }
}
