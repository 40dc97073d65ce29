//! Opaque session tokens.
//!
//! Tokens are 256-bit random values encoded as base64url without padding.
//! Only their SHA-256 digest is ever stored.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use evalhub_core::ResourceId;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// A freshly issued session token. The raw `token` is handed to the client once.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub principal_id: ResourceId,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("principal_id", &self.principal_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Generate a cryptographically secure random token (43 characters).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex-encoded SHA-256 of a token, used as the storage key.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pulls the token out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` as well as a bare `<token>`. Blank values yield `None`.
pub fn extract_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() || token == "Bearer" {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_base64url() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash, hash_token("abc"));
    }

    #[test]
    fn extracts_bearer_and_bare_tokens() {
        assert_eq!(extract_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_token("abc123"), Some("abc123"));
        assert_eq!(extract_token("  Bearer   abc123 "), Some("abc123"));
        assert_eq!(extract_token(""), None);
        assert_eq!(extract_token("   "), None);
        assert_eq!(extract_token("Bearer "), None);
        assert_eq!(extract_token("Bearer"), None);
    }

    #[test]
    fn debug_redacts_raw_token() {
        let token = SessionToken {
            token: "super-secret".into(),
            principal_id: ResourceId::new(1),
            issued_at: OffsetDateTime::UNIX_EPOCH,
            expires_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
