//! HTTP-facing error type for the order service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::{auth::AuthError, engine::OrderError, middleware::GateError, validation::ValidationIssue};

const UNEXPECTED_MESSAGE: &str = "An unexpected error has occurred.";
const SIGN_IN_FAILED: &str =
    "Authentication failed. Please check your email and/or password and try again.";

/// Error type returned by every handler
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body failed validation
    #[error("Invalid input")]
    InvalidInput(Vec<ValidationIssue>),

    /// Missing, malformed or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    /// A uniqueness or relational constraint rejected the write
    #[error("Conflict: {reason}: {message}")]
    Conflict {
        reason: &'static str,
        message: String,
    },

    /// The order does not exist
    #[error("Order {0} not found")]
    NotFound(String),

    /// A patch tried to update an item the order does not have
    #[error("Item {product_id} not found on order {order_id}")]
    ItemNotFound { order_id: String, product_id: i32 },

    /// The store cannot be reached
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// Unexpected failure; the detail is logged, never returned
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) | ApiError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::InvalidInput(issues) => json!({ "errors": issues }),
            ApiError::Unauthorized(message) => json!({ "error": message }),
            ApiError::Conflict { reason, message } => json!({
                "error": { "reason": reason, "message": message }
            }),
            ApiError::NotFound(order_id) => json!({
                "error": format!("Order: \"{}\" not found.", order_id)
            }),
            ApiError::ItemNotFound {
                order_id,
                product_id,
            } => json!({
                "error": format!("Item: \"{}\" not found on order \"{}\".", product_id, order_id)
            }),
            ApiError::ServiceUnavailable => json!({ "status": "unavailable" }),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                json!({ "error": UNEXPECTED_MESSAGE })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        debug!("Request rejected at gate: {}", err);
        match err {
            GateError::MissingCredential => ApiError::Unauthorized("No authorization header"),
            GateError::MalformedCredential => ApiError::Unauthorized("Invalid authorization format"),
            GateError::AuthenticationFailed => ApiError::Unauthorized("Authentication required"),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(issues) => ApiError::InvalidInput(issues),
            AuthError::DuplicateIdentity => ApiError::Conflict {
                reason: "Unique constraint failed",
                message: "An account with this email already exists".to_string(),
            },
            AuthError::MissingRequiredField => ApiError::Conflict {
                reason: "Null constraint failed",
                message: "User requires an email".to_string(),
            },
            AuthError::AuthenticationFailed => ApiError::Unauthorized(SIGN_IN_FAILED),
            AuthError::Unexpected(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidInput(message) => {
                ApiError::InvalidInput(vec![ValidationIssue::new("body", message)])
            }
            OrderError::DuplicateIdentity(message) => ApiError::Conflict {
                reason: "Unique constraint failed",
                message,
            },
            OrderError::MissingRequiredField(message) => ApiError::Conflict {
                reason: "Null constraint failed",
                message,
            },
            OrderError::ConstraintViolation(message) => ApiError::Conflict {
                reason: "Foreign key constraint failed",
                message,
            },
            OrderError::RecordNotFound(order_id) => ApiError::NotFound(order_id),
            OrderError::ItemNotFound {
                order_id,
                product_id,
            } => ApiError::ItemNotFound {
                order_id,
                product_id,
            },
            OrderError::Unexpected(err) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
