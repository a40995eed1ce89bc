use super::types::{OperationResult, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SclError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote SCL error: {0}")]
    Remote(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SclError>;

impl SclError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::MethodNotAllowed(message.into())
    }

    /// Status code reported to protocol adapters for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SclError::NotFound(_) => StatusCode::NotFound,
            SclError::BadRequest(_) => StatusCode::BadRequest,
            SclError::Conflict(_) => StatusCode::Conflict,
            SclError::PermissionDenied(_) => StatusCode::PermissionDenied,
            SclError::MethodNotAllowed(_) => StatusCode::MethodNotAllowed,
            SclError::NotImplemented(_) => StatusCode::NotImplemented,
            SclError::Remote(_) => StatusCode::BadGateway,
            SclError::Storage(_) | SclError::LockError(_) | SclError::Internal(_) => {
                StatusCode::InternalServerError
            }
        }
    }
}

impl From<SclError> for OperationResult {
    fn from(err: SclError) -> Self {
        OperationResult::error(err.status_code(), err.to_string())
    }
}

impl From<serde_json::Error> for SclError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid representation: {}", err))
    }
}

impl From<std::io::Error> for SclError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SclError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
