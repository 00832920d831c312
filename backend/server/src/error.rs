use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Missing image key")]
    MissingKey,

    #[error("Invalid image key")]
    InvalidKey,

    #[error("Image not found")]
    NotFound,

    #[error("Failed to fetch image: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload
            | AppError::MissingField(_)
            | AppError::MissingKey
            | AppError::InvalidKey => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Storage and internal failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Storage request failed".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{self}");
        }

        let body = json!({
            "success": false,
            "error": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::AppError;

    #[test]
    fn test_status() {
        assert_eq!(AppError::MissingKey.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingField("imageUrl").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Upstream("Not Found".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_message_is_generic() {
        let error = AppError::Storage(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));

        assert_eq!(error.public_message(), "Storage request failed");
    }

    #[test]
    fn test_internal_message_is_generic() {
        let error = AppError::Internal("task 12 panicked".to_string());

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Internal server error");
    }

    #[test]
    fn test_upstream_message_keeps_status_text() {
        let error = AppError::Upstream("Not Found".to_string());

        assert_eq!(error.public_message(), "Failed to fetch image: Not Found");
    }

    #[test]
    fn test_into_response() {
        let response = AppError::NotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
