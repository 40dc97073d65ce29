//! Session storage contracts and the session authenticator.
//!
//! A principal holds at most one active session: issuing a new token
//! supersedes the previous one. Expired sessions are removed lazily when
//! they are next presented.

use std::sync::Arc;

use async_trait::async_trait;
use evalhub_core::{Principal, ResourceId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::{SessionToken, extract_token, generate_token, hash_token};

/// A persisted session. Holds the token digest, never the raw token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub principal_id: ResourceId,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Storage for sessions.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Stores `session` as the principal's only session.
    ///
    /// Returns the session it replaced, if any. The replaced token must no
    /// longer be found by [`SessionStorage::find_by_token_hash`].
    async fn replace(&self, session: Session) -> AuthResult<Option<Session>>;

    /// Finds a session by token digest, regardless of expiry.
    async fn find_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>>;

    /// Removes the session with this digest. Returns whether one existed.
    async fn delete_by_token_hash(&self, token_hash: &str) -> AuthResult<bool>;

    /// Removes the principal's session. Returns whether one existed.
    async fn delete_for_principal(&self, principal_id: ResourceId) -> AuthResult<bool>;
}

/// Loads the principal a session belongs to.
#[async_trait]
pub trait PrincipalStorage: Send + Sync {
    async fn find_principal(&self, id: ResourceId) -> AuthResult<Option<Principal>>;
}

/// Resolves bearer tokens to principals and manages session lifecycles.
#[derive(Clone)]
pub struct SessionAuthenticator {
    sessions: Arc<dyn SessionStorage>,
    principals: Arc<dyn PrincipalStorage>,
    ttl: time::Duration,
}

impl SessionAuthenticator {
    pub fn new(
        sessions: Arc<dyn SessionStorage>,
        principals: Arc<dyn PrincipalStorage>,
        config: &AuthConfig,
    ) -> Self {
        let ttl = time::Duration::try_from(config.session_ttl)
            .unwrap_or_else(|_| time::Duration::days(7));
        Self {
            sessions,
            principals,
            ttl,
        }
    }

    pub fn ttl(&self) -> time::Duration {
        self.ttl
    }

    /// Resolves a raw token. Unknown, superseded and expired tokens yield `None`.
    pub async fn authenticate(&self, token: &str) -> AuthResult<Option<Principal>> {
        if token.is_empty() {
            return Ok(None);
        }
        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_by_token_hash(&token_hash).await? else {
            tracing::debug!("unknown session token presented");
            return Ok(None);
        };

        if session.is_expired_at(OffsetDateTime::now_utc()) {
            tracing::debug!(principal_id = %session.principal_id, "expired session token presented");
            self.sessions.delete_by_token_hash(&token_hash).await?;
            return Ok(None);
        }

        let principal = self.principals.find_principal(session.principal_id).await?;
        if principal.is_none() {
            tracing::debug!(principal_id = %session.principal_id, "session principal no longer exists");
            self.sessions.delete_by_token_hash(&token_hash).await?;
        }
        Ok(principal)
    }

    /// Resolves an `Authorization` header value, failing with the 401 variants.
    pub async fn authenticate_header(&self, header: Option<&str>) -> AuthResult<Principal> {
        let token = header
            .and_then(extract_token)
            .ok_or(AuthError::MissingToken)?;
        self.authenticate(token)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Issues a new token for `principal`, superseding any previous one.
    pub async fn create_session(&self, principal: &Principal) -> AuthResult<SessionToken> {
        let token = generate_token();
        let issued_at = OffsetDateTime::now_utc();
        let expires_at = issued_at
            .checked_add(self.ttl)
            .ok_or_else(|| AuthError::internal("session expiry overflows"))?;

        let session = Session {
            token_hash: hash_token(&token),
            principal_id: principal.id,
            issued_at,
            expires_at,
        };
        let superseded = self.sessions.replace(session).await?;
        tracing::debug!(
            principal_id = %principal.id,
            superseded = superseded.is_some(),
            "session created"
        );

        Ok(SessionToken {
            token,
            principal_id: principal.id,
            issued_at,
            expires_at,
        })
    }

    /// Ends the principal's session. Returns whether one was active.
    pub async fn invalidate(&self, principal: &Principal) -> AuthResult<bool> {
        let removed = self.sessions.delete_for_principal(principal.id).await?;
        tracing::debug!(principal_id = %principal.id, removed, "session invalidated");
        Ok(removed)
    }
}
