use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::pdf::PdfError;
use crate::together::GatewayError;
use crate::wizard::WizardError;

/// Any failure a handler reports, rendered as `{ "error": message }`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, message) }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }

    pub fn not_found(message: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Configuration => Self::internal(e.to_string()),
            GatewayError::Validation(message) => Self::bad_request(message),
            GatewayError::Upstream { status, message } => {
                Self::new(StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY), message)
            }
            GatewayError::Processing(message) => Self::internal(message),
            GatewayError::Http(err) => Self::internal(err.to_string()),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(e: WizardError) -> Self {
        let status = match e {
            WizardError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WizardError::UnknownPage(_) | WizardError::UnknownSlot { .. } => StatusCode::NOT_FOUND,
            WizardError::WrongStep { .. }
            | WizardError::NotRendered { .. }
            | WizardError::Busy
            | WizardError::Editing
            | WizardError::GenerationIncomplete
            | WizardError::StaleJob => StatusCode::CONFLICT,
        };
        Self::new(status, e.to_string())
    }
}

impl From<PdfError> for ApiError {
    fn from(e: PdfError) -> Self { Self::internal(e.to_string()) }
}
