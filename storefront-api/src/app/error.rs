use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use storefront_core::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    /// 缺少或无法识别 X-User-Id
    pub fn unauthenticated() -> Self {
        Self::new(
            "Unauthorized",
            StatusCode::UNAUTHORIZED,
            "Authentication required",
        )
    }

    pub fn unauthorized_with_message(message: impl Into<String>) -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, message)
    }

    pub fn permission_denied() -> Self {
        Self::unauthorized_with_message("Permission denied")
    }

    pub fn admin_required() -> Self {
        Self::unauthorized_with_message("Admin access required")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", StatusCode::NOT_FOUND, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::new("NotFound", StatusCode::NOT_FOUND, msg),
            ServiceError::AlreadyExists(msg) => {
                ApiError::new("AlreadyExists", StatusCode::BAD_REQUEST, msg)
            }
            ServiceError::Validation(msg) => {
                ApiError::new("ValidationError", StatusCode::BAD_REQUEST, msg)
            }
            ServiceError::InvalidToken(msg) => {
                ApiError::new("InvalidToken", StatusCode::BAD_REQUEST, msg)
            }
            ServiceError::Unauthorized(msg) => {
                ApiError::new("Unauthorized", StatusCode::UNAUTHORIZED, msg)
            }
            ServiceError::PolicyViolation(msg) => {
                ApiError::new("PolicyViolation", StatusCode::BAD_REQUEST, msg)
            }
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "database error");
                ApiError::new(
                    "DatabaseError",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error",
                )
            }
            ServiceError::Io(e) => {
                tracing::error!(error = %e, "io error");
                ApiError::new(
                    "IoError",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (ServiceError::user_not_found(), StatusCode::NOT_FOUND),
            (
                ServiceError::AlreadyExists("Email already exists".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidToken("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (
                ServiceError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(ServiceError::Io(std::io::Error::other("/var/data/users.db")));
        assert_eq!(err.message, "internal server error");
    }
}
