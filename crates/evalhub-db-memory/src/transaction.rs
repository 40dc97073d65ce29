use async_trait::async_trait;
use evalhub_core::{NewRecord, Record, ResourceId, ResourceType};
use evalhub_storage::{FindScope, RecordFilter, StorageError, Transaction};
use time::OffsetDateTime;
use tokio::sync::OwnedRwLockWriteGuard;

use crate::tables::Tables;

/// A transaction over [`crate::InMemoryStorage`].
///
/// Holds the storage write lock and works on a staged copy of the tables.
/// `commit` swaps the copy in; `rollback` or drop leaves the tables untouched.
pub struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
    writes: usize,
}

impl InMemoryTransaction {
    pub(crate) fn new(guard: OwnedRwLockWriteGuard<Tables>) -> Self {
        let staged = (*guard).clone();
        Self {
            guard,
            staged,
            writes: 0,
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
        scope: FindScope,
    ) -> Result<Option<Record>, StorageError> {
        Ok(self.staged.find(resource_type, id, scope))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, StorageError> {
        Ok(self.staged.list(resource_type, filter))
    }

    async fn create(&mut self, draft: NewRecord) -> Result<Record, StorageError> {
        let record = self.staged.insert(draft, OffsetDateTime::now_utc())?;
        self.writes += 1;
        Ok(record)
    }

    async fn update(&mut self, record: Record) -> Result<Record, StorageError> {
        let record = self.staged.update(record, OffsetDateTime::now_utc())?;
        self.writes += 1;
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryTransaction {
            mut guard,
            staged,
            writes,
        } = *self;
        *guard = staged;
        tracing::debug!(writes, "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        tracing::debug!(writes = self.writes, "transaction rolled back");
        Ok(())
    }
}
