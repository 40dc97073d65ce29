//! Query types shared by storage backends.

use evalhub_core::{Record, ResourceId, ResourceType};
use serde_json::Value;

/// Whether soft-deleted rows are visible to a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FindScope {
    #[default]
    Active,
    WithDeleted,
}

impl FindScope {
    pub fn admits(self, record: &Record) -> bool {
        match self {
            FindScope::Active => !record.is_deleted(),
            FindScope::WithDeleted => true,
        }
    }
}

/// Conjunctive filter over rows of a single type.
///
/// # Example
///
/// ```ignore
/// let filter = RecordFilter::new()
///     .referencing(ResourceType::User, user_id)
///     .referencing(ResourceType::EvaluationQuestion, eq_id);
/// let answers = storage.list(ResourceType::Answer, &filter).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    references: Vec<(ResourceType, ResourceId)>,
    attributes: Vec<(String, Value)>,
    ids: Option<Vec<ResourceId>>,
    scope: FindScope,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreign key to `target` must equal `id`.
    pub fn referencing(mut self, target: ResourceType, id: ResourceId) -> Self {
        self.references.push((target, id));
        self
    }

    /// Serialized attribute `name` must equal `value`.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Row id must be one of `ids`.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ResourceId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_scope(mut self, scope: FindScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> FindScope {
        self.scope
    }

    pub fn matches(&self, record: &Record) -> bool {
        if !self.scope.admits(record) {
            return false;
        }
        if self.ids.as_ref().is_some_and(|ids| !ids.contains(&record.id())) {
            return false;
        }
        let references_match = self
            .references
            .iter()
            .all(|(target, id)| record.foreign_key(*target) == Some(*id));
        if !references_match {
            return false;
        }
        if self.attributes.is_empty() {
            return true;
        }
        let json = record.to_json();
        self.attributes
            .iter()
            .all(|(name, value)| json.get(name) == Some(value))
    }
}
