use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;

/// Envelope every operation result is wrapped in before it leaves the process.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
            metadata: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(err: &AppError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(err.to_string()),
            metadata: Some(err.metadata()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::QuotesUnavailable(cause) => tracing::error!("{} ({})", self, cause),
            AppError::ConversionUnavailable { reason, .. } => {
                tracing::error!("{} ({})", self, reason)
            }
            AppError::OutOfRange(what) => tracing::error!("{} ({})", self, what),
            _ if status.is_server_error() => tracing::error!("{}", self),
            _ => tracing::debug!("{} [{}]", self, status),
        }
        (status, Json(ApiResponse::error(&self))).into_response()
    }
}
