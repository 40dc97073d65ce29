//! Row storage and schema constraints.

use std::collections::{BTreeMap, BTreeSet};

use evalhub_core::{Evaluation, NewRecord, Record, ResourceId, ResourceType};
use evalhub_storage::{FindScope, RecordFilter, StorageError};
use serde_json::Value;
use time::OffsetDateTime;

const ACCESS_CODE_ATTEMPTS: usize = 32;

/// Unique indexes per table. A row whose indexed columns include a null is
/// not constrained by that index.
fn unique_indexes(resource_type: ResourceType) -> &'static [&'static [&'static str]] {
    match resource_type {
        ResourceType::Institution => &[&["name"]],
        ResourceType::User => &[&["institution_id", "email"]],
        ResourceType::Evaluation => &[&["access_code"]],
        ResourceType::Question => &[],
        ResourceType::EvaluationQuestion => &[&["evaluation_id", "question_id"]],
        ResourceType::Answer => &[&["user_id", "evaluation_question_id"]],
    }
}

fn index_key(json: &Value, columns: &[&str]) -> Option<Vec<Value>> {
    columns
        .iter()
        .map(|column| match json.get(*column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        })
        .collect()
}

/// All rows, keyed by type then id.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    rows: BTreeMap<ResourceType, BTreeMap<ResourceId, Record>>,
    last_id: u64,
}

impl Tables {
    fn table(&self, resource_type: ResourceType) -> impl Iterator<Item = &Record> {
        self.rows
            .get(&resource_type)
            .into_iter()
            .flat_map(|table| table.values())
    }

    fn get(&self, resource_type: ResourceType, id: ResourceId) -> Option<&Record> {
        self.rows.get(&resource_type).and_then(|table| table.get(&id))
    }

    pub(crate) fn find(
        &self,
        resource_type: ResourceType,
        id: ResourceId,
        scope: FindScope,
    ) -> Option<Record> {
        self.get(resource_type, id)
            .filter(|record| scope.admits(record))
            .cloned()
    }

    pub(crate) fn list(&self, resource_type: ResourceType, filter: &RecordFilter) -> Vec<Record> {
        self.table(resource_type)
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    pub(crate) fn insert(
        &mut self,
        draft: NewRecord,
        now: OffsetDateTime,
    ) -> Result<Record, StorageError> {
        let draft = self.fill_defaults(draft)?;
        let id = ResourceId::new(self.last_id + 1);
        let record = draft.into_record(id, now);
        self.check_constraints(&record)?;

        self.last_id = id.get();
        self.rows
            .entry(record.resource_type())
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    pub(crate) fn update(
        &mut self,
        mut record: Record,
        now: OffsetDateTime,
    ) -> Result<Record, StorageError> {
        let resource_type = record.resource_type();
        let id = record.id();
        let Some(existing) = self.get(resource_type, id) else {
            return Err(StorageError::not_found(resource_type, id));
        };
        if existing.created_at() != record.created_at() {
            return Err(StorageError::internal(format!(
                "{resource_type}/{id}: created_at is immutable"
            )));
        }
        self.check_constraints(&record)?;

        record.touch(now);
        self.rows
            .entry(resource_type)
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    /// Stamps `deleted_at`. Already-deleted rows are not found.
    pub(crate) fn soft_delete(
        &mut self,
        resource_type: ResourceType,
        id: ResourceId,
        now: OffsetDateTime,
    ) -> Result<(), StorageError> {
        let record = self
            .rows
            .get_mut(&resource_type)
            .and_then(|table| table.get_mut(&id))
            .filter(|record| !record.is_deleted())
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;
        if !record.set_deleted_at(Some(now)) {
            return Err(StorageError::internal(format!(
                "{resource_type} has no deleted_at column"
            )));
        }
        record.touch(now);
        Ok(())
    }

    /// Removes the row and, recursively, every row referencing it.
    pub(crate) fn hard_delete(
        &mut self,
        resource_type: ResourceType,
        id: ResourceId,
    ) -> Result<usize, StorageError> {
        if self.get(resource_type, id).is_none() {
            return Err(StorageError::not_found(resource_type, id));
        }

        let mut pending = vec![(resource_type, id)];
        let mut removed = 0;
        while let Some((ty, row_id)) = pending.pop() {
            if let Some(table) = self.rows.get_mut(&ty) {
                if table.remove(&row_id).is_some() {
                    removed += 1;
                }
            }
            for dependent in ResourceType::ALL {
                if !dependent.has_foreign_key(ty) {
                    continue;
                }
                pending.extend(
                    self.table(dependent)
                        .filter(|record| record.foreign_key(ty) == Some(row_id))
                        .map(|record| (dependent, record.id())),
                );
            }
        }
        Ok(removed)
    }

    pub(crate) fn restore(
        &mut self,
        resource_type: ResourceType,
        id: ResourceId,
        now: OffsetDateTime,
    ) -> Result<Record, StorageError> {
        let record = self
            .rows
            .get_mut(&resource_type)
            .and_then(|table| table.get_mut(&id))
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;
        if record.is_deleted() {
            record.set_deleted_at(None);
            record.touch(now);
        }
        Ok(record.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    fn fill_defaults(&self, draft: NewRecord) -> Result<NewRecord, StorageError> {
        match draft {
            NewRecord::Evaluation(mut evaluation) if evaluation.access_code.is_none() => {
                evaluation.access_code = Some(self.unused_access_code()?);
                Ok(NewRecord::Evaluation(evaluation))
            }
            NewRecord::EvaluationQuestion(mut link) if link.position.is_none() => {
                let max = self
                    .table(ResourceType::EvaluationQuestion)
                    .filter(|record| {
                        record.foreign_key(ResourceType::Evaluation) == Some(link.evaluation_id)
                    })
                    .filter_map(|record| match record {
                        Record::EvaluationQuestion(row) => Some(row.position),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0);
                link.position = Some(max + 1);
                Ok(NewRecord::EvaluationQuestion(link))
            }
            other => Ok(other),
        }
    }

    fn unused_access_code(&self) -> Result<String, StorageError> {
        let taken: BTreeSet<&str> = self
            .table(ResourceType::Evaluation)
            .filter_map(|record| match record {
                Record::Evaluation(row) => Some(row.access_code.as_str()),
                _ => None,
            })
            .collect();
        (0..ACCESS_CODE_ATTEMPTS)
            .map(|_| Evaluation::generate_access_code())
            .find(|code| !taken.contains(code.as_str()))
            .ok_or_else(|| StorageError::internal("could not generate a unique access code"))
    }

    fn check_constraints(&self, record: &Record) -> Result<(), StorageError> {
        let resource_type = record.resource_type();
        record.validate().into_result()?;

        for target in resource_type.foreign_keys() {
            let Some(fk) = record.foreign_key(*target) else {
                continue;
            };
            if self.get(*target, fk).is_none() {
                tracing::debug!(%resource_type, %target, id = %fk, "foreign key violation");
                return Err(StorageError::foreign_key_violation(resource_type, *target));
            }
        }

        let json = record.to_json();
        for columns in unique_indexes(resource_type) {
            let Some(key) = index_key(&json, columns) else {
                continue;
            };
            let taken = self
                .table(resource_type)
                .filter(|other| other.id() != record.id())
                .any(|other| index_key(&other.to_json(), columns).as_ref() == Some(&key));
            if taken {
                tracing::debug!(%resource_type, columns = ?columns, "unique index violation");
                return Err(StorageError::unique_violation(resource_type, columns));
            }
        }
        Ok(())
    }
}
