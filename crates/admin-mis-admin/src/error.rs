//! The error type returned by every admin API handler.

use admin_mis_auth::backends::{INVALID_TOKEN, NOT_AUTHENTICATED};
use admin_mis_core::MisError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// An API failure, rendered as a JSON body with the matching status.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the given body, e.g. `{"message": ..}` or form errors.
    Parse(Value),
    /// 404 `{"detail": ..}`.
    NotFound(String),
    /// 403 with the standard detail.
    PermissionDenied,
    /// 401 with the given detail.
    NotAuthenticated(String),
    /// 405 for an HTTP method outside the permission map.
    MethodNotAllowed(String),
    /// 500; the cause is logged, not returned.
    Internal(MisError),
}

impl ApiError {
    /// A 400 with `{"message": message}`.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Parse(json!({ "message": message.into() }))
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::Parse(body) => body.clone(),
            Self::NotFound(detail) | Self::NotAuthenticated(detail) => json!({ "detail": detail }),
            Self::PermissionDenied => json!({ "detail": PERMISSION_DENIED }),
            Self::MethodNotAllowed(method) => {
                json!({ "detail": format!("Method \"{method}\" not allowed.") })
            }
            Self::Internal(_) => json!({ "detail": "A server error occurred." }),
        }
    }
}

impl From<MisError> for ApiError {
    fn from(err: MisError) -> Self {
        match err {
            MisError::BadRequest(message) => Self::message(message),
            MisError::Unauthorized(detail) => Self::NotAuthenticated(detail),
            MisError::PermissionDenied(_) | MisError::ProtectedError(_) => Self::PermissionDenied,
            MisError::NotFound(detail) | MisError::DoesNotExist(detail) => Self::NotFound(detail),
            MisError::MethodNotAllowed(method) => Self::MethodNotAllowed(method),
            MisError::ValidationError(err) => {
                Self::Parse(json!(err.message_dict("non_field_errors")))
            }
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal(err) => tracing::error!(error = %err, "admin API request failed"),
            Self::NotAuthenticated(detail)
                if detail != NOT_AUTHENTICATED && detail != INVALID_TOKEN =>
            {
                tracing::debug!(detail = %detail, "rejected malformed credentials");
            }
            _ => {}
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::message("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::PermissionDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotAuthenticated(NOT_AUTHENTICATED.into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::MethodNotAllowed("PUT".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_bodies() {
        assert_eq!(
            ApiError::message("Model does not exist.").body(),
            json!({"message": "Model does not exist."})
        );
        assert_eq!(ApiError::PermissionDenied.body(), json!({"detail": PERMISSION_DENIED}));
        assert_eq!(
            ApiError::Internal(MisError::DatabaseError("disk".into())).body(),
            json!({"detail": "A server error occurred."})
        );
    }

    #[test]
    fn test_from_mis_error() {
        let err: ApiError = MisError::DoesNotExist("gone".into()).into();
        assert!(matches!(err, ApiError::NotFound(ref d) if d == "gone"));
        let err: ApiError = MisError::IntegrityError("dup".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let err: ApiError = MisError::Unauthorized(INVALID_TOKEN.into()).into();
        assert_eq!(err.body(), json!({"detail": INVALID_TOKEN}));
    }
}
