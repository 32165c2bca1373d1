//! Authentication error types.

use crate::transport::TransportError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity service rejected the username/password pair
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Account creation was refused
    #[error("Signup failed: {0}")]
    SignupFailed(String),

    /// A success response lacked a field we depend on
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request-level 401
    #[error("Unauthorized")]
    Unauthorized,

    /// Refresh token invalid or expired (terminal)
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),

    /// Transport-level failure (transient, can retry)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Unauthorized and the refresh was rejected
    #[error("Session expired")]
    SessionExpired,

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] session_config_and_utils::CoreError),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::NetworkError(_))
    }

    /// Returns true if this error ends the session (store and state cleared).
    pub fn forces_logout(&self) -> bool {
        matches!(self, AuthError::RefreshRejected(_) | AuthError::SessionExpired)
    }
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> Self {
        AuthError::NetworkError(err.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
