//! Resource-hierarchy resolution.
//!
//! [`ResourceResolver::resolve`] turns the request's parameter bag into a
//! [`ResolvedChain`]: the target row plus every ancestor declared in the
//! hierarchy, each checked to belong to the next. A row that exists but hangs
//! under a different parent is reported exactly like a missing one.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use evalhub_api::ApiError;
use evalhub_core::{HierarchyConfig, Record, ResolvedChain, ResourceId, ResourceType};
use evalhub_storage::{DynStorage, FindScope, StorageError};

/// Merged path and query parameters.
///
/// Identifiers (`id` and `{type}_id`) are taken from the path only, so the
/// query string cannot redirect a request to another row.
#[derive(Default)]
pub struct RequestParams(HashMap<String, String>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Value of `key`; blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Parses `{type}_id`.
    pub fn id_of(&self, resource_type: ResourceType) -> Option<ResourceId> {
        self.get(&resource_type.id_param())
            .and_then(|raw| raw.parse().ok())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Query(query)| query)
            .unwrap_or_default();
        let path = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(path)| path)
            .unwrap_or_default();
        Ok(Self::from_parts(query, path))
    }
}

impl RequestParams {
    /// Combines query and path parameters, dropping identifier keys from the query.
    pub fn from_parts(query: HashMap<String, String>, path: HashMap<String, String>) -> Self {
        let mut params: HashMap<String, String> = query
            .into_iter()
            .filter(|(key, _)| !is_identifier(key))
            .collect();
        params.extend(path);
        Self(params)
    }
}

fn is_identifier(key: &str) -> bool {
    key == "id" || key.ends_with("_id")
}

/// Which lookup rules apply to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveAction {
    #[default]
    Read,
    /// Soft-deleted rows of restorable types are visible.
    Restore,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{} ID is missing", .resource_type.class_name())]
    MissingId { resource_type: ResourceType },

    #[error("Couldn't find {} with ID={id}", .resource_type.class_name())]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    #[error(
        "{} with ID={id} not assigned to {} with ID={parent_id}",
        .resource_type.class_name(),
        .parent_type.class_name()
    )]
    NotAssigned {
        resource_type: ResourceType,
        id: ResourceId,
        parent_type: ResourceType,
        parent_id: ResourceId,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResolveError {
    /// The resource type the failure is about.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            Self::MissingId { resource_type }
            | Self::NotFound { resource_type, .. }
            | Self::NotAssigned { resource_type, .. } => Some(*resource_type),
            Self::Storage(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err.resource_type() {
            Some(resource_type) => {
                ApiError::resource_not_found(err.to_string(), resource_type.class_name())
            }
            None => match err {
                ResolveError::Storage(storage) => ApiError::from(storage),
                other => ApiError::internal(other.to_string()),
            },
        }
    }
}

/// Resolves nested resources against the configured hierarchy.
#[derive(Clone)]
pub struct ResourceResolver {
    hierarchy: Arc<HierarchyConfig>,
    storage: DynStorage,
}

impl ResourceResolver {
    pub fn new(hierarchy: Arc<HierarchyConfig>, storage: DynStorage) -> Self {
        Self { hierarchy, storage }
    }

    pub fn hierarchy(&self) -> &HierarchyConfig {
        &self.hierarchy
    }

    /// Resolves `target` and its ancestors from `params`.
    ///
    /// Every id along the chain is read before the first storage lookup. The
    /// target's id comes from `id`, falling back to `{target}_id`; ancestors
    /// only use `{type}_id`.
    pub async fn resolve(
        &self,
        target: ResourceType,
        params: &RequestParams,
        action: ResolveAction,
    ) -> Result<ResolvedChain, ResolveError> {
        let ancestry = self.hierarchy.ancestry(target);

        let mut raw_ids = Vec::with_capacity(ancestry.len());
        for (depth, resource_type) in ancestry.iter().copied().enumerate() {
            let key = resource_type.id_param();
            let raw = if depth == 0 {
                params.get("id").or_else(|| params.get(&key))
            } else {
                params.get(&key)
            };
            raw_ids.push(raw.ok_or(ResolveError::MissingId { resource_type })?);
        }

        let mut rows = Vec::with_capacity(ancestry.len());
        for (resource_type, raw) in ancestry.iter().copied().zip(raw_ids) {
            rows.push(self.lookup(resource_type, raw, action).await?);
        }

        // Root first, so an ancestor is accepted before anything beneath it.
        for depth in (1..rows.len()).rev() {
            let parent = &rows[depth];
            let child = &rows[depth - 1];
            check_assigned(child, parent)?;
        }

        let mut rows = rows.into_iter();
        let Some(target_row) = rows.next() else {
            return Err(StorageError::internal(format!("empty ancestry for {target}")).into());
        };
        Ok(ResolvedChain::new(target_row, rows.collect()))
    }

    async fn lookup(
        &self,
        resource_type: ResourceType,
        raw: &str,
        action: ResolveAction,
    ) -> Result<Record, ResolveError> {
        let not_found = || ResolveError::NotFound {
            resource_type,
            id: raw.to_string(),
        };
        let Ok(id) = raw.parse::<ResourceId>() else {
            return Err(not_found());
        };
        let scope = if action == ResolveAction::Restore
            && self.hierarchy.supports_restore(resource_type)
        {
            FindScope::WithDeleted
        } else {
            FindScope::Active
        };
        self.storage
            .find(resource_type, id, scope)
            .await?
            .ok_or_else(not_found)
    }
}

fn check_assigned(child: &Record, parent: &Record) -> Result<(), ResolveError> {
    let parent_type = parent.resource_type();
    if child.foreign_key(parent_type) == Some(parent.id()) {
        return Ok(());
    }
    tracing::debug!(
        resource = %child.resource_type(),
        id = %child.id(),
        parent = %parent_type,
        parent_id = %parent.id(),
        "resource not assigned to requested parent"
    );
    Err(ResolveError::NotAssigned {
        resource_type: child.resource_type(),
        id: child.id(),
        parent_type,
        parent_id: parent.id(),
    })
}
