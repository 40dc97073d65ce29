//! Storage traits.
//!
//! Backends enforce the schema constraints: foreign keys, unique indexes
//! and the soft-delete marker. Unique indexes are checked under the
//! backend's write lock, so they are authoritative even when two
//! requests race past an application-level pre-check.

use async_trait::async_trait;
use evalhub_core::{NewRecord, Record, ResourceId, ResourceType};

use crate::error::StorageError;
use crate::types::{FindScope, RecordFilter};

/// The storage contract every EvalHub backend implements.
///
/// # Example
///
/// ```ignore
/// async fn load_evaluation(storage: &dyn EvalStorage, id: ResourceId) -> Result<Record, StorageError> {
///     storage
///         .find(ResourceType::Evaluation, id, FindScope::Active)
///         .await?
///         .ok_or_else(|| StorageError::not_found(ResourceType::Evaluation, id))
/// }
/// ```
#[async_trait]
pub trait EvalStorage: Send + Sync {
    /// Looks up a row by type and id.
    ///
    /// Returns `None` for missing rows and for soft-deleted rows outside `scope`.
    async fn find(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
        scope: FindScope,
    ) -> Result<Option<Record>, StorageError>;

    /// Rows of `resource_type` matching `filter`, ordered by id.
    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, StorageError>;

    /// Inserts a new row and returns it with id and timestamps assigned.
    ///
    /// # Errors
    ///
    /// `Validation` for attribute errors, `ForeignKeyViolation` for dangling
    /// references, `UniqueViolation` when a unique index rejects the row.
    async fn create(&self, draft: NewRecord) -> Result<Record, StorageError>;

    /// Replaces an existing row. Immutable columns (id, created_at) are kept.
    async fn update(&self, record: Record) -> Result<Record, StorageError>;

    /// Deletes a row. Types in the soft-delete set get `deleted_at` stamped;
    /// all others are removed together with the rows that depend on them.
    async fn delete(&self, resource_type: ResourceType, id: ResourceId)
    -> Result<(), StorageError>;

    /// Clears `deleted_at` on a soft-deleted row.
    async fn restore(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
    ) -> Result<Record, StorageError>;

    /// Opens a transaction. Writes through it become visible on `commit`.
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, StorageError>;

    fn backend_name(&self) -> &'static str;

    /// First row matching `filter`, if any.
    async fn first(
        &self,
        resource_type: ResourceType,
        filter: &RecordFilter,
    ) -> Result<Option<Record>, StorageError> {
        Ok(self.list(resource_type, filter).await?.into_iter().next())
    }
}

/// A unit of work over an [`EvalStorage`].
///
/// Reads inside the transaction see its own uncommitted writes. Dropping a
/// transaction without calling `commit` discards its writes.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn find(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
        scope: FindScope,
    ) -> Result<Option<Record>, StorageError>;

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, StorageError>;

    async fn create(&mut self, draft: NewRecord) -> Result<Record, StorageError>;

    async fn update(&mut self, record: Record) -> Result<Record, StorageError>;

    /// Makes all writes visible.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if the commit fails.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discards all writes.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_storage_object_safe(_: &dyn EvalStorage) {}

    fn _assert_transaction_object_safe(_: &dyn Transaction) {}
}
