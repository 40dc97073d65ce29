//! In-memory storage backend for EvalHub.
//!
//! [`InMemoryStorage`] implements [`EvalStorage`] over a set of tables held
//! behind a tokio `RwLock`. Foreign keys, unique indexes and the soft-delete
//! marker are enforced the same way a relational schema would enforce them.
//! [`InMemorySessionStorage`] keeps sessions in papaya lock-free maps.
//!
//! # Example
//!
//! ```ignore
//! use evalhub_core::{NewInstitution, ResourceType};
//! use evalhub_db_memory::InMemoryStorage;
//! use evalhub_storage::{EvalStorage, FindScope};
//!
//! let storage = InMemoryStorage::new();
//! let institution = storage
//!     .create(NewInstitution { name: "Acme".into(), description: None }.into())
//!     .await?;
//! let found = storage
//!     .find(ResourceType::Institution, institution.id(), FindScope::Active)
//!     .await?;
//! ```

mod session;
mod storage;
mod tables;
mod transaction;

pub use evalhub_storage::{DynStorage, EvalStorage, StorageError, Transaction};
pub use session::InMemorySessionStorage;
pub use storage::InMemoryStorage;
pub use transaction::InMemoryTransaction;
