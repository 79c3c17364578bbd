use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failures surfaced by session controller operations.
///
/// Missing records on leave/remove paths are absorbed as no-ops and never
/// reach the caller as `NotFound`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound { .. } => ErrorCode::NotFound,
            SessionError::StoreUnavailable(_) => ErrorCode::Unavailable,
            SessionError::InvalidRequest(_) => ErrorCode::Validation,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
