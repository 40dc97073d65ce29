use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use evalhub_core::{HierarchyConfig, NewRecord, Record, ResourceId, ResourceType};
use evalhub_storage::{EvalStorage, FindScope, RecordFilter, StorageError, Transaction};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::tables::Tables;
use crate::transaction::InMemoryTransaction;

/// In-memory EvalHub storage backend.
///
/// All tables live behind one `RwLock`. Writes take the lock for the
/// duration of the constraint check and the write, so unique indexes hold
/// under concurrent requests. A transaction holds the write lock until it
/// commits or rolls back.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    pub(crate) tables: Arc<RwLock<Tables>>,
    soft_delete: Arc<BTreeSet<ResourceType>>,
}

impl InMemoryStorage {
    /// Creates an empty storage using the standard hierarchy's soft-delete set.
    pub fn new() -> Self {
        Self::with_hierarchy(&HierarchyConfig::standard())
    }

    pub fn with_hierarchy(hierarchy: &HierarchyConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            soft_delete: Arc::new(hierarchy.soft_delete_types().collect()),
        }
    }

    pub fn is_soft_deleted(&self, resource_type: ResourceType) -> bool {
        self.soft_delete.contains(&resource_type)
    }

    /// Total number of rows across all tables, soft-deleted ones included.
    pub async fn count(&self) -> usize {
        self.tables.read().await.len()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvalStorage for InMemoryStorage {
    async fn find(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
        scope: FindScope,
    ) -> Result<Option<Record>, StorageError> {
        Ok(self.tables.read().await.find(resource_type, id, scope))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, StorageError> {
        Ok(self.tables.read().await.list(resource_type, filter))
    }

    async fn create(&self, draft: NewRecord) -> Result<Record, StorageError> {
        let resource_type = draft.resource_type();
        let record = self
            .tables
            .write()
            .await
            .insert(draft, OffsetDateTime::now_utc())?;
        tracing::debug!(%resource_type, id = %record.id(), "record created");
        Ok(record)
    }

    async fn update(&self, record: Record) -> Result<Record, StorageError> {
        self.tables
            .write()
            .await
            .update(record, OffsetDateTime::now_utc())
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if self.is_soft_deleted(resource_type) {
            tables.soft_delete(resource_type, id, OffsetDateTime::now_utc())?;
            tracing::debug!(%resource_type, %id, "record soft-deleted");
        } else {
            let removed = tables.hard_delete(resource_type, id)?;
            tracing::debug!(%resource_type, %id, removed, "record deleted");
        }
        Ok(())
    }

    async fn restore(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
    ) -> Result<Record, StorageError> {
        if !self.is_soft_deleted(resource_type) {
            return Err(StorageError::internal(format!(
                "{resource_type} does not support restore"
            )));
        }
        self.tables
            .write()
            .await
            .restore(resource_type, id, OffsetDateTime::now_utc())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, StorageError> {
        let guard = self.tables.clone().write_owned().await;
        Ok(Box::new(InMemoryTransaction::new(guard)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalhub_core::{
        NewAnswer, NewEvaluation, NewEvaluationQuestion, NewInstitution, NewQuestion, NewUser,
        QuestionType, Role,
    };

    async fn institution(storage: &InMemoryStorage, name: &str) -> ResourceId {
        storage
            .create(
                NewInstitution {
                    name: name.into(),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap()
            .id()
    }

    async fn evaluation(storage: &InMemoryStorage, institution_id: ResourceId) -> ResourceId {
        storage
            .create(
                NewEvaluation {
                    institution_id,
                    name: "Final".into(),
                    description: None,
                    is_active: true,
                    access_code: None,
                }
                .into(),
            )
            .await
            .unwrap()
            .id()
    }

    /// Returns `(user_id, evaluation_question_id)` ready to be answered.
    async fn answerable(storage: &InMemoryStorage) -> (ResourceId, ResourceId) {
        let inst = institution(storage, "Acme").await;
        let eval = evaluation(storage, inst).await;
        let question = storage
            .create(
                NewQuestion {
                    institution_id: inst,
                    question_text: "Rate it".into(),
                    question_type: QuestionType::RatingScale,
                    options: vec!["1".into(), "2".into(), "3".into()],
                }
                .into(),
            )
            .await
            .unwrap()
            .id();
        let link = storage
            .create(
                NewEvaluationQuestion {
                    evaluation_id: eval,
                    question_id: question,
                    position: None,
                    is_modified: false,
                }
                .into(),
            )
            .await
            .unwrap()
            .id();
        let user = storage
            .create(
                NewUser {
                    institution_id: inst,
                    name: "Sam".into(),
                    email: None,
                    role: Role::Student,
                    password_hash: None,
                }
                .into(),
            )
            .await
            .unwrap()
            .id();
        (user, link)
    }

    fn answer(user_id: ResourceId, evaluation_question_id: ResourceId) -> NewRecord {
        NewAnswer {
            user_id,
            evaluation_question_id,
            answer_text: None,
            selected_options: vec!["3".into()],
        }
        .into()
    }

    #[tokio::test]
    async fn test_create_find_list() {
        let storage = InMemoryStorage::new();
        let id = institution(&storage, "Acme").await;
        institution(&storage, "Globex").await;

        let found = storage
            .find(ResourceType::Institution, id, FindScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), id);

        let all = storage
            .list(ResourceType::Institution, &RecordFilter::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.windows(2).all(|pair| pair[0].id() < pair[1].id()));

        let first = storage
            .first(
                ResourceType::Institution,
                &RecordFilter::new().with_attribute("name", "Globex"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.to_json()["name"], "Globex");
    }

    #[tokio::test]
    async fn test_duplicate_institution_name() {
        let storage = InMemoryStorage::new();
        institution(&storage, "Acme").await;
        let err = storage
            .create(
                NewInstitution {
                    name: "Acme".into(),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_bumps_updated_at() {
        let storage = InMemoryStorage::new();
        let id = institution(&storage, "Acme").await;
        let mut record = storage
            .find(ResourceType::Institution, id, FindScope::Active)
            .await
            .unwrap()
            .unwrap();
        let before = record.clone();
        if let Record::Institution(inst) = &mut record {
            inst.description = Some("A school".into());
        }

        let updated = storage.update(record).await.unwrap();
        assert_eq!(updated.id(), id);
        assert_eq!(updated.created_at(), before.created_at());
        assert_eq!(updated.to_json()["description"], "A school");
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let storage = InMemoryStorage::new();
        let id = institution(&storage, "Acme").await;
        let record = storage
            .find(ResourceType::Institution, id, FindScope::Active)
            .await
            .unwrap()
            .unwrap();
        storage.delete(ResourceType::Institution, id).await.unwrap();
        assert!(storage.update(record).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_and_restore_reveals() {
        let storage = InMemoryStorage::new();
        let inst = institution(&storage, "Acme").await;
        let eval = evaluation(&storage, inst).await;

        storage.delete(ResourceType::Evaluation, eval).await.unwrap();
        assert!(
            storage
                .find(ResourceType::Evaluation, eval, FindScope::Active)
                .await
                .unwrap()
                .is_none()
        );
        let hidden = storage
            .find(ResourceType::Evaluation, eval, FindScope::WithDeleted)
            .await
            .unwrap()
            .unwrap();
        assert!(hidden.is_deleted());

        let restored = storage.restore(ResourceType::Evaluation, eval).await.unwrap();
        assert!(!restored.is_deleted());
        assert!(
            storage
                .restore(ResourceType::Institution, inst)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_hard_delete_cascades_to_dependents() {
        let storage = InMemoryStorage::new();
        let (user, link) = answerable(&storage).await;
        storage.create(answer(user, link)).await.unwrap();

        storage.delete(ResourceType::User, user).await.unwrap();
        let answers = storage
            .list(ResourceType::Answer, &RecordFilter::new())
            .await
            .unwrap();
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_answers() {
        let storage = InMemoryStorage::new();
        let (user, link) = answerable(&storage).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.create(answer(user, link)).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) if err.is_unique_violation() => conflicts += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let storage = InMemoryStorage::new();
        let (user, link) = answerable(&storage).await;

        let mut tx = storage.begin_transaction().await.unwrap();
        let created = tx.create(answer(user, link)).await.unwrap();
        assert!(
            tx.find(ResourceType::Answer, created.id(), FindScope::Active)
                .await
                .unwrap()
                .is_some()
        );
        tx.commit().await.unwrap();

        assert!(
            storage
                .find(ResourceType::Answer, created.id(), FindScope::Active)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_transaction_rollback_and_drop_discard_writes() {
        let storage = InMemoryStorage::new();
        let (user, link) = answerable(&storage).await;
        let before = storage.count().await;

        let mut tx = storage.begin_transaction().await.unwrap();
        tx.create(answer(user, link)).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(storage.count().await, before);

        {
            let mut tx = storage.begin_transaction().await.unwrap();
            tx.create(answer(user, link)).await.unwrap();
        }
        assert_eq!(storage.count().await, before);
        assert!(storage.create(answer(user, link)).await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_sees_its_own_unique_index() {
        let storage = InMemoryStorage::new();
        let (user, link) = answerable(&storage).await;

        let mut tx = storage.begin_transaction().await.unwrap();
        tx.create(answer(user, link)).await.unwrap();
        let err = tx.create(answer(user, link)).await.unwrap_err();
        assert!(err.is_unique_violation());
        tx.rollback().await.unwrap();
    }
}
