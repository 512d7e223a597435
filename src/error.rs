use std::fmt;

/// Broad classification of a [`SessionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The backing store could not be reached or failed mid-operation.
    Unavailable,
    /// Caller supplied configuration or arguments that cannot be used.
    InvalidInput,
    /// Serialization or other internal failures.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Error returned by stores, the manager, and configuration validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SessionError {
    pub code: ErrorCode,
    pub message: String,
}

impl SessionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

pub fn unavailable(message: impl Into<String>) -> SessionError {
    SessionError::new(ErrorCode::Unavailable, message)
}

pub fn invalid_argument(message: impl Into<String>) -> SessionError {
    SessionError::new(ErrorCode::InvalidInput, message)
}

pub fn internal(message: impl Into<String>) -> SessionError {
    SessionError::new(ErrorCode::Internal, message)
}

pub(crate) fn serde_error(err: serde_json::Error) -> SessionError {
    internal(err.to_string())
}

#[cfg(feature = "redis")]
pub(crate) fn redis_error(err: redis::RedisError) -> SessionError {
    unavailable(err.to_string())
}
