use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("File too large")]
    FileTooLarge,

    #[error("File processing error: {0}")]
    FileProcessing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) | AppError::ImageDecode(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::FileProcessing(_)
            | AppError::Storage(_)
            | AppError::Timeout(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Database error"
            }
            AppError::Auth(ref msg) => msg.as_str(),
            AppError::Validation(ref msg) => msg.as_str(),
            AppError::Conflict(ref msg) => msg.as_str(),
            AppError::ImageDecode(ref msg) => {
                tracing::debug!("Rejected undecodable upload: {}", msg);
                "Could not decode image"
            }
            AppError::FileTooLarge => "File too large",
            AppError::FileProcessing(ref msg) => {
                tracing::error!("Image processing error: {}", msg);
                "Error processing image"
            }
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                "Storage error"
            }
            AppError::Timeout(ref msg) => {
                tracing::error!("Upstream timeout: {}", msg);
                "Upstream service timed out"
            }
            AppError::NotFound => "Resource not found",
            AppError::Forbidden => "Access forbidden",
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ImageDecode("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Auth("no".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::FileTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::Storage("remote down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_leaked() {
        let response = AppError::Storage("secret bucket path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Storage error");
        assert_eq!(json["status"], 500);
    }
}
