use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Empty or missing required input (text, comments, task)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, corrupt or incompatible model artifacts
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Feature or preprocessing mismatch while running a model
    #[error("Transform error: {0}")]
    Transform(String),

    /// Request exceeds a size cap
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// Not enough usable samples to fit a model
    #[error("Insufficient training data: {usable} usable samples, {required} required")]
    InsufficientData { usable: usize, required: usize },

    /// Operation needs a capability that is not available right now
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Capacity(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Artifact(_) => "ARTIFACT_ERROR",
            AppError::Transform(_) => "TRANSFORM_ERROR",
            AppError::Capacity(_) => "CAPACITY_EXCEEDED",
            AppError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Validation("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Capacity("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ServiceUnavailable("test".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::InsufficientData {
                usable: 2,
                required: 5
            }
            .error_code(),
            "INSUFFICIENT_DATA"
        );
        assert_eq!(
            AppError::Transform("x".to_string()).error_code(),
            "TRANSFORM_ERROR"
        );
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = AppError::InsufficientData {
            usable: 3,
            required: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient training data: 3 usable samples, 5 required"
        );
    }
}
