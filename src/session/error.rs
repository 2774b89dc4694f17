//! Session error types

use crate::api::ApiError;
use crate::credentials::CredentialError;
use crate::notify::Route;
use thiserror::Error;

/// Errors from login, signup, refresh and access guards
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Your account is pending activation. Please wait for admin approval.")]
    AccountPending,

    /// 403 from the backend, carrying its `detail`
    #[error("{0}")]
    Forbidden(String),

    /// Any other refusal with a server-supplied reason
    #[error("{0}")]
    Rejected(String),

    #[error("Not authorized as admin")]
    NotAdmin,

    #[error("No refresh token stored")]
    NoRefreshToken,

    /// A guard refused access and asked for navigation to `0`
    #[error("Access denied, redirected to {0}")]
    AccessDenied(Route),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Credential storage error: {0}")]
    Credentials(#[from] CredentialError),
}

impl SessionError {
    /// Map a failed login request to the reason shown to the user
    pub(crate) fn from_login_failure(err: ApiError) -> Self {
        match err.status() {
            Some(401) if matches!(err, ApiError::Http { .. }) => SessionError::InvalidCredentials,
            Some(403) => {
                let detail = err.detail().unwrap_or_default();
                if detail.to_lowercase().contains("pending") {
                    SessionError::AccountPending
                } else if detail.to_lowercase().contains("not authorized as admin") {
                    SessionError::NotAdmin
                } else {
                    SessionError::Forbidden(detail)
                }
            }
            _ => SessionError::Api(err),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
