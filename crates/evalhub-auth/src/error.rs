//! Authentication and authorization error types.

use std::fmt;

use axum::response::{IntoResponse, Response};
use evalhub_api::ApiError;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("Missing authorization token")]
    MissingToken,

    /// The token is unknown, superseded, invalidated or expired.
    #[error("Invalid or expired session token")]
    InvalidSession,

    /// Credentials were presented but rejected.
    #[error("{message}")]
    Unauthorized { message: String },

    /// The authenticated principal may not perform the action.
    #[error("{message}")]
    Forbidden { message: String },

    /// The session store failed.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for failures that should produce a 401.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::InvalidSession | Self::Unauthorized { .. }
        )
    }

    /// Returns `true` for failures that should produce a 403.
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Internal { .. })
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingToken | Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::InvalidSession => ErrorCategory::Session,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of auth errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Session,
    Authorization,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Session => write!(f, "session"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_server_error() {
            return ApiError::internal(err.to_string());
        }
        let message = err.to_string();
        if err.is_authorization_error() {
            ApiError::forbidden(message)
        } else {
            ApiError::unauthorized(message)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, header};

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::MissingToken.to_string(), "Missing authorization token");
        assert_eq!(
            AuthError::InvalidSession.to_string(),
            "Invalid or expired session token"
        );
        assert_eq!(
            AuthError::forbidden("Instructor access required").to_string(),
            "Instructor access required"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::MissingToken.category(), ErrorCategory::Authentication);
        assert_eq!(AuthError::InvalidSession.category(), ErrorCategory::Session);
        assert_eq!(
            AuthError::forbidden("x").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(AuthError::storage("x").category(), ErrorCategory::Infrastructure);
        assert!(AuthError::InvalidSession.is_authentication_error());
        assert!(!AuthError::forbidden("x").is_authentication_error());
    }

    #[test]
    fn responses_use_the_api_envelope() {
        let resp = AuthError::MissingToken.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_some());

        let resp = AuthError::forbidden("You can only access your own answers").into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = AuthError::storage("session map unavailable").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
