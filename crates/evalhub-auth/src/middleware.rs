//! Bearer token authentication extractor.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use evalhub_auth::{AuthState, BearerAuth};
//!
//! async fn whoami(BearerAuth(principal): BearerAuth) -> String {
//!     format!("principal {}", principal.id)
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use evalhub_core::Principal;

use crate::error::AuthError;
use crate::session::SessionAuthenticator;

/// State required by [`BearerAuth`], made available through `FromRef`.
///
/// ```ignore
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<SessionAuthenticator>,
}

impl AuthState {
    pub fn new(authenticator: Arc<SessionAuthenticator>) -> Self {
        Self { authenticator }
    }
}

/// Extractor that resolves the `Authorization` header to a [`Principal`].
///
/// Rejects with `401 Missing authorization token` when no token is present
/// and `401 Invalid or expired session token` when it does not resolve.
pub struct BearerAuth(pub Principal);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let principal = auth_state
            .authenticator
            .authenticate_header(header)
            .await
            .inspect_err(|e| {
                tracing::debug!(error = %e, category = %e.category(), "request authentication failed");
            })?;

        Ok(BearerAuth(principal))
    }
}
