use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docgate_core::DenyReason;
use docgate_storage::StorageError;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("{0}")]
    Authorization(DenyReason),

    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{detail}")]
    Unclassified { kind: String, detail: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    pub fn unclassified(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        GatewayError::Unclassified {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "operation panicked".to_string()
        };
        GatewayError::unclassified("Panic", detail)
    }

    /// Classification name written to `error.kind` in failure records.
    pub fn kind(&self) -> &str {
        match self {
            GatewayError::Authentication(_) => "AuthenticationFailure",
            GatewayError::Authorization(_) => "AuthorizationFailure",
            GatewayError::Validation(_) => "ValidationFailure",
            GatewayError::RateLimited(_) => "RateLimitExceeded",
            GatewayError::Storage(e) => e.kind(),
            GatewayError::Unclassified { kind, .. } => kind,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(AuthError::Internal(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Storage(StorageError::DocumentNotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Storage(StorageError::DuplicateKey(_)) => StatusCode::CONFLICT,
            GatewayError::Storage(StorageError::InvalidCommand(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Storage(_) | GatewayError::Unclassified { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        if status == StatusCode::UNAUTHORIZED {
            return (status, [("www-authenticate", "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use docgate_core::PermissionClass;

    use super::*;

    #[test]
    fn authorization_error_carries_deny_reason() {
        let err = GatewayError::Authorization(DenyReason::OutOfScope {
            class: PermissionClass::Write,
            db: "prod_db".to_string(),
            collection: "secrets".to_string(),
        });

        assert_eq!(err.kind(), "AuthorizationFailure");
        assert_eq!(
            err.to_string(),
            "user not authorized for 'write' on 'prod_db.secrets'."
        );
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_errors_keep_backend_classification() {
        let err: GatewayError = StorageError::DuplicateKey("_id a".to_string()).into();

        assert_eq!(err.kind(), "DuplicateKey");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: GatewayError = StorageError::Unavailable("down".to_string()).into();
        assert_eq!(err.kind(), "Unavailable");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: GatewayError = StorageError::DocumentNotFound("gone".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn authentication_errors_are_401() {
        let err: GatewayError = AuthError::Expired.into();

        assert_eq!(err.kind(), "AuthenticationFailure");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Token has expired.");
    }

    #[test]
    fn rate_limited_is_429() {
        let err = GatewayError::RateLimited("100 per 1 minute".to_string());

        assert_eq!(err.kind(), "RateLimitExceeded");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "Rate limit exceeded: 100 per 1 minute");
    }

    #[test]
    fn panic_payloads_become_unclassified() {
        let err = GatewayError::from_panic(Box::new("boom"));
        assert_eq!(err.kind(), "Panic");
        assert_eq!(err.to_string(), "boom");

        let err = GatewayError::from_panic(Box::new(String::from("kaboom")));
        assert_eq!(err.to_string(), "kaboom");

        let err = GatewayError::from_panic(Box::new(42_u8));
        assert_eq!(err.to_string(), "operation panicked");
    }
}
