//! Error responses. Every failure leaves as `{success: false, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use flame_auth::{AuthzError, TokenError};
use flame_core::DomainError;
use flame_infra::{ErrorClass, ServiceError};

use super::envelope::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Unreadable JSON body, query string or path segment.
    #[error("{0}")]
    BadRequest(String),

    #[error("Route not found")]
    RouteNotFound,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Service(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(err) => match err.class() {
                ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
                ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorClass::Forbidden => StatusCode::FORBIDDEN,
                ErrorClass::NotFound => StatusCode::NOT_FOUND,
                ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        };
        (status, Json(Envelope::<()>::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_their_class() {
        let not_found: ApiError = DomainError::not_found("Order").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Order not found");

        let stock: ApiError = DomainError::InsufficientStock {
            product: "Tuborg".into(),
            available: 3,
            requested: 5,
        }
        .into();
        assert_eq!(stock.status(), StatusCode::BAD_REQUEST);

        let expired: ApiError = TokenError::Expired.into();
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

        let denied: ApiError = AuthzError::Forbidden("nope").into();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let export: ApiError = ServiceError::Export("disk full".into()).into();
        assert_eq!(export.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
