//! Error types for Blogline
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use std::fmt;
use thiserror::Error;

/// Main error type for Blogline operations
///
/// Validation errors are raised before any backend call. Authentication
/// errors carry the backend's own error code unchanged. Store errors cover
/// feed loads and post appends.
#[derive(Error, Debug)]
pub enum BloglineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected locally (empty credentials, empty draft)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failure reported by the backend
    #[error("Authentication error: {message} ({code})")]
    Authentication {
        /// Classified failure
        kind: AuthErrorKind,
        /// Backend error code as received (e.g. `EMAIL_EXISTS`)
        code: String,
        /// Human-readable message
        message: String,
    },

    /// Document store errors (query or append)
    #[error("Store error: {0}")]
    Store(String),

    /// Backend construction or protocol errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl BloglineError {
    /// Build an authentication error from a backend error code
    ///
    /// The code is classified into an [`AuthErrorKind`] and kept verbatim
    /// alongside a human-readable message.
    ///
    /// # Examples
    ///
    /// ```
    /// use blogline::error::{AuthErrorKind, BloglineError};
    ///
    /// let err = BloglineError::auth_from_code("EMAIL_EXISTS");
    /// assert_eq!(err.auth_kind(), Some(AuthErrorKind::EmailAlreadyInUse));
    /// ```
    pub fn auth_from_code(code: &str) -> Self {
        let kind = AuthErrorKind::from_backend_code(code);
        Self::Authentication {
            kind,
            code: code.to_string(),
            message: kind.to_string(),
        }
    }

    /// Authentication error for a transport failure (no response at all)
    pub fn network_unavailable(detail: impl fmt::Display) -> Self {
        Self::Authentication {
            kind: AuthErrorKind::NetworkUnavailable,
            code: "NETWORK_REQUEST_FAILED".to_string(),
            message: format!("{}: {}", AuthErrorKind::NetworkUnavailable, detail),
        }
    }

    /// Returns the authentication kind when this is an authentication error
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Authentication { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Classification of authentication failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Unknown email, wrong password, or both
    InvalidCredentials,
    /// Sign-up with an email that already has an account
    EmailAlreadyInUse,
    /// Password rejected by the backend's strength policy
    WeakPassword,
    /// Malformed email address
    InvalidEmail,
    /// Account disabled by an administrator
    UserDisabled,
    /// Backend throttling
    TooManyAttempts,
    /// Refresh token expired or revoked
    SessionExpired,
    /// Backend unreachable
    NetworkUnavailable,
    /// Anything the client does not classify
    Other,
}

impl AuthErrorKind {
    /// Classify a backend error code
    ///
    /// Codes may carry a detail suffix after ` : ` (for example
    /// `WEAK_PASSWORD : Password should be at least 6 characters`); only the
    /// leading code is matched.
    pub fn from_backend_code(code: &str) -> Self {
        let head = code.split(" : ").next().unwrap_or(code).trim();
        match head {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
            | "MISSING_PASSWORD" | "USER_NOT_FOUND" => Self::InvalidCredentials,
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" => {
                Self::SessionExpired
            }
            "NETWORK_REQUEST_FAILED" => Self::NetworkUnavailable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidCredentials => "Invalid email or password",
            Self::EmailAlreadyInUse => "Email is already in use",
            Self::WeakPassword => "Password is too weak",
            Self::InvalidEmail => "Email address is invalid",
            Self::UserDisabled => "Account has been disabled",
            Self::TooManyAttempts => "Too many attempts, try again later",
            Self::SessionExpired => "Session has expired, sign in again",
            Self::NetworkUnavailable => "Network unavailable",
            Self::Other => "Authentication failed",
        };
        f.write_str(text)
    }
}

/// Result type alias for Blogline operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = BloglineError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_validation_error_display() {
        let error = BloglineError::Validation("Email is required".to_string());
        assert_eq!(error.to_string(), "Validation error: Email is required");
    }

    #[test]
    fn test_auth_error_keeps_backend_code() {
        let error = BloglineError::auth_from_code("EMAIL_EXISTS");
        assert_eq!(
            error.to_string(),
            "Authentication error: Email is already in use (EMAIL_EXISTS)"
        );
    }

    #[test]
    fn test_auth_kind_mapping() {
        assert_eq!(
            AuthErrorKind::from_backend_code("INVALID_LOGIN_CREDENTIALS"),
            AuthErrorKind::InvalidCredentials
        );
        assert_eq!(
            AuthErrorKind::from_backend_code("INVALID_PASSWORD"),
            AuthErrorKind::InvalidCredentials
        );
        assert_eq!(
            AuthErrorKind::from_backend_code(
                "WEAK_PASSWORD : Password should be at least 6 characters"
            ),
            AuthErrorKind::WeakPassword
        );
        assert_eq!(
            AuthErrorKind::from_backend_code("TOKEN_EXPIRED"),
            AuthErrorKind::SessionExpired
        );
        assert_eq!(
            AuthErrorKind::from_backend_code("SOMETHING_NEW"),
            AuthErrorKind::Other
        );
    }

    #[test]
    fn test_network_unavailable() {
        let error = BloglineError::network_unavailable("connection refused");
        assert_eq!(error.auth_kind(), Some(AuthErrorKind::NetworkUnavailable));
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_auth_kind_none_for_other_errors() {
        let error = BloglineError::Store("down".to_string());
        assert_eq!(error.auth_kind(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: BloglineError = io_error.into();
        assert!(matches!(error, BloglineError::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_str = "invalid: : yaml";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: BloglineError = yaml_error.into();
        assert!(matches!(error, BloglineError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BloglineError>();
    }
}
