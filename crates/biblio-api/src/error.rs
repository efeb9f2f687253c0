//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use biblio_core::ValidationErrors;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// The record changed since the client loaded it.
    Conflict {
        message: String,
        snapshot_id: Option<Uuid>,
    },
    /// `If-Match` present but not a snapshot id.
    PreconditionFailed(String),
    /// `If-Match` missing on a mutation.
    PreconditionRequired,
    Validation(ValidationErrors),
    Internal(biblio_core::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::PreconditionRequired => StatusCode::PRECONDITION_REQUIRED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("You are not allowed to do this".to_string())
    }
}

impl From<biblio_core::Error> for ApiError {
    fn from(err: biblio_core::Error) -> Self {
        use biblio_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::RecordNotFound(id) => ApiError::NotFound(format!("Record {} not found", id)),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Validation(errors) => ApiError::Validation(errors),
            Error::Conflict { id, actual, .. } => ApiError::Conflict {
                message: format!("Record {} was changed by someone else", id),
                snapshot_id: Some(actual),
            },
            other => ApiError::Internal(other),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Conflict {
                message,
                snapshot_id,
            } => json!({
                "error": message,
                "reload": true,
                "snapshot_id": snapshot_id,
            }),
            ApiError::Validation(errors) => json!({
                "error": "Validation failed",
                "errors": errors,
            }),
            ApiError::PreconditionRequired => json!({
                "error": "If-Match header with the record snapshot id is required",
            }),
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                json!({ "error": err.to_string() })
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::PreconditionFailed(msg) => json!({ "error": msg }),
        };

        (status, Json(body)).into_response()
    }
}
