use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// A single rejected input field.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every error an operation can surface to a caller.
///
/// Each variant maps onto the HTTP status the client-facing envelope reports,
/// see [`AppError::status_code`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The quote provider could not be reached or returned garbage.
    #[error("Unable to fetch stocks. Please try again later")]
    QuotesUnavailable(String),

    /// Exchange rates could not be obtained for a currency pair.
    #[error("Unable to convert {from} to {to}. Please try again later")]
    ConversionUnavailable {
        from: String,
        to: String,
        reason: String,
    },

    /// A valuation exceeded the representable range.
    #[error("Portfolio value is out of range")]
    OutOfRange(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::QuotesUnavailable(_) | AppError::ConversionUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::OutOfRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extra detail attached to the error envelope. Provider failures keep
    /// their underlying cause out of the client payload; it is logged instead.
    pub fn metadata(&self) -> Value {
        match self {
            AppError::Validation(errors) => json!({ "errors": errors }),
            _ => json!({}),
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }
}
