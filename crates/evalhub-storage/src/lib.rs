//! # evalhub-storage
//!
//! Storage abstraction layer for EvalHub.
//!
//! This crate defines the traits and types storage backends implement. It
//! contains no implementation; see `evalhub-db-memory`.
//!
//! The main trait is [`EvalStorage`]: typed CRUD over [`evalhub_core::Record`]s,
//! soft delete / restore, and transactions.

mod error;
mod traits;
mod types;

use std::sync::Arc;

pub use error::{ErrorCategory, StorageError};
pub use traits::{EvalStorage, Transaction};
pub use types::{FindScope, RecordFilter};

/// Shared handle to a storage backend.
pub type DynStorage = Arc<dyn EvalStorage>;
