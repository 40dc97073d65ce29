//! # evalhub-auth
//!
//! Session authentication and access policy for EvalHub.
//!
//! ## Modules
//!
//! - [`token`] - opaque token generation, hashing and header extraction
//! - [`session`] - session storage contracts and [`SessionAuthenticator`]
//! - [`policy`] - role and tenant predicates plus `require_*` guards
//! - [`middleware`] - the [`BearerAuth`] axum extractor
//! - [`password`] - Argon2id password hashing
//! - [`config`] - session configuration

pub mod config;
pub mod error;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod session;
pub mod token;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use middleware::{AuthState, BearerAuth};
pub use password::{hash_password, verify_password};
pub use session::{PrincipalStorage, Session, SessionAuthenticator, SessionStorage};
pub use token::{SessionToken, extract_token, generate_token, hash_token};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
