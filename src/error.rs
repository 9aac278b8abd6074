use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Duplicates are reported as a plain bad request
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to a client
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Storage(msg) => msg.clone(),
            AppError::Internal(msg) if !msg.is_empty() => msg.clone(),
            AppError::Jwt(_) => "Invalid token".to_string(),
            _ => INTERNAL_SERVER_ERROR.to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Storage(msg) => tracing::error!("Storage error: {}", msg),
            AppError::Hash(e) => tracing::error!("Password hash error: {:?}", e),
            AppError::Io(e) => tracing::error!("IO error: {:?}", e),
            AppError::Request(e) => tracing::error!("Request error: {:?}", e),
            AppError::Jwt(e) => tracing::warn!("JWT error: {:?}", e),
            AppError::Unauthorized(msg) => tracing::warn!("Unauthorized: {}", msg),
            _ => tracing::debug!("{}", self),
        }
    }
}

/// Uniform failure envelope: `{success:false, statusCode, error}`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub status_code: u16,
    pub error: String,
}

/// Success envelope carrying a message and/or a payload
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: None,
        }
    }
}

/// Payload serialized at the top level next to `success: true`
#[derive(Debug, Serialize)]
pub struct Flat<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub inner: T,
}

impl<T: Serialize> Flat<T> {
    pub fn new(inner: T) -> Self {
        Self {
            success: true,
            inner,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            status_code: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflict_renders_as_bad_request() {
        let (status, body) = render(AppError::Conflict("Email already exists!".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "Email already exists!");
    }

    #[tokio::test]
    async fn driver_errors_are_not_leaked() {
        let (status, body) = render(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_SERVER_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "/secret/path");
        let (_, body) = render(AppError::Io(io)).await;
        assert_eq!(body["error"], INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn empty_internal_message_falls_back() {
        let (status, body) = render(AppError::Internal(String::new())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["error"], INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn flat_merges_payload_fields() {
        #[derive(Serialize)]
        struct Payload {
            id: &'static str,
        }
        let value = serde_json::to_value(Flat::new(Payload { id: "42" })).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "id": "42" }));
    }
}
