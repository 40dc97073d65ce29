//! Authentication configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session settings.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// session_ttl = "7d"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of a session token from the moment it is issued.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
}

impl AuthConfig {
    pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    const MAX_SESSION_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidSessionTtl(
                "auth.session_ttl must be greater than zero".into(),
            ));
        }
        if self.session_ttl > Self::MAX_SESSION_TTL {
            return Err(ConfigError::InvalidSessionTtl(
                "auth.session_ttl must not exceed 366 days".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Self::DEFAULT_SESSION_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    InvalidSessionTtl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_seven_days() {
        assert_eq!(AuthConfig::default().session_ttl, Duration::from_secs(604_800));
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_ttl() {
        let zero = AuthConfig {
            session_ttl: Duration::ZERO,
        };
        assert!(zero.validate().is_err());
        let huge = AuthConfig {
            session_ttl: Duration::from_secs(400 * 24 * 60 * 60),
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn parses_humantime() {
        let config: AuthConfig = serde_json::from_str(r#"{"session_ttl": "12h"}"#).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(12 * 60 * 60));
    }
}
