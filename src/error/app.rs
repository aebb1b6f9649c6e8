use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error as ThisError;
use tracing::error;

use crate::domain::Money;

/// Value sent in `WWW-Authenticate` on every 401.
pub const AUTH_CHALLENGE: &str = r#"Basic realm="dryfruits", charset="UTF-8""#;

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("Insufficient credit limit (available {available}, required {required})")]
    InsufficientCredit { available: Money, required: Money },

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("too many login attempts")]
    TooManyRequests,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            AppError::Database(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject::new("NOT_FOUND", "Record not found."),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject::new("NOT_FOUND", format!("{what} not found.")),
            ),
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject::new("VALIDATION_ERROR", message),
            ),
            AppError::Csv(e) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject::new("VALIDATION_ERROR", format!("Error processing file: {e}")),
            ),
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, ApiErrorObject::new("CONFLICT", message))
            }
            AppError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorObject::new("UNPROCESSABLE", message),
            ),
            AppError::InsufficientCredit {
                available,
                required,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorObject {
                    code: "INSUFFICIENT_CREDIT".to_string(),
                    message: "Insufficient credit limit.".to_string(),
                    details: Some(json!({
                        "available_credit": available,
                        "required_amount": required,
                    })),
                },
            ),
            AppError::Unauthorized => {
                return unauthorized("Authentication credentials were not provided.");
            }
            AppError::InvalidCredentials => return unauthorized("Invalid email or password."),
            AppError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, ApiErrorObject::new("FORBIDDEN", message))
            }
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorObject::new("RATE_LIMIT", "Too many login attempts, try again later."),
            ),
            AppError::Database(ref e) => {
                error!(error = %e, "database error while serving request");
                internal()
            }
            AppError::Internal(ref e) => {
                error!(error = %e, "internal error while serving request");
                internal()
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

fn unauthorized(message: &str) -> axum::response::Response {
    let mut resp = (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorBody {
            inner: ApiErrorObject::new("UNAUTHORIZED", message),
        }),
    )
        .into_response();
    resp.headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_CHALLENGE));
    resp
}

fn internal() -> (StatusCode, ApiErrorObject) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiErrorObject::new("INTERNAL_ERROR", "An internal server error occurred."),
    )
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorObject {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}
