//! Declarative resource hierarchy.
//!
//! A [`HierarchyDeclaration`] is the raw, name-based form read from
//! configuration:
//!
//! ```toml
//! [hierarchy.edges]
//! institution = []
//! user = ["institution"]
//! evaluation = ["institution"]
//! question = ["institution"]
//! evaluation_question = ["evaluation"]
//! answer = ["evaluation_question"]
//!
//! [hierarchy.join_resources]
//! evaluation_question = ["evaluation", "question"]
//!
//! [hierarchy]
//! soft_delete = ["evaluation", "question"]
//! ```
//!
//! [`HierarchyConfig::from_declaration`] validates it once at startup and
//! produces the immutable graph the resolver and join handler consume.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::ResourceType;

/// Name-based hierarchy as it appears in configuration.
///
/// A key left out of a declared section is empty. The standard graph is only
/// the default for a missing section as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyDeclaration {
    /// `type -> [parent]`; an empty list marks a root.
    #[serde(default)]
    pub edges: IndexMap<String, Vec<String>>,
    /// `join type -> [path side, body side]`.
    #[serde(default)]
    pub join_resources: IndexMap<String, Vec<String>>,
    /// Types whose deletes are soft and which support the restore action.
    #[serde(default)]
    pub soft_delete: Vec<String>,
}

impl Default for HierarchyDeclaration {
    fn default() -> Self {
        let edge = |child: &str, parent: Option<&str>| {
            (
                child.to_string(),
                parent.map(str::to_string).into_iter().collect::<Vec<_>>(),
            )
        };
        Self {
            edges: IndexMap::from([
                edge("institution", None),
                edge("user", Some("institution")),
                edge("evaluation", Some("institution")),
                edge("question", Some("institution")),
                edge("evaluation_question", Some("evaluation")),
                edge("answer", Some("evaluation_question")),
            ]),
            join_resources: IndexMap::from([(
                "evaluation_question".to_string(),
                vec!["evaluation".to_string(), "question".to_string()],
            )]),
            soft_delete: vec!["evaluation".to_string(), "question".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("unknown resource type '{0}' in hierarchy declaration")]
    UnknownType(String),

    #[error("resource type '{0}' declares more than one parent")]
    MultipleParents(ResourceType),

    #[error("resource type '{0}' is declared more than once")]
    DuplicateDeclaration(ResourceType),

    #[error("resource type '{0}' is missing from the hierarchy declaration")]
    Undeclared(ResourceType),

    #[error("hierarchy contains a cycle through '{0}'")]
    Cycle(ResourceType),

    #[error("'{child}' has no foreign key referencing '{parent}'")]
    MissingForeignKey {
        child: ResourceType,
        parent: ResourceType,
    },

    #[error("join resource '{0}' must name exactly two distinct sides")]
    InvalidJoinSides(ResourceType),

    #[error("join resource '{resource}' path side '{side}' must be its hierarchy parent")]
    JoinSideNotParent {
        resource: ResourceType,
        side: ResourceType,
    },

    #[error("resource type '{0}' has no deleted_at column and cannot be soft-deleted")]
    SoftDeleteUnsupported(ResourceType),
}

/// The two sides of a many-to-many join resource.
///
/// `side_a` is the hierarchy parent and always comes from the URL path;
/// `side_b` is named in the request body (create) or path (update/destroy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinDescriptor {
    pub resource: ResourceType,
    pub side_a: ResourceType,
    pub side_b: ResourceType,
}

/// Validated, immutable hierarchy graph plus join registry and soft-delete set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
    parents: BTreeMap<ResourceType, Option<ResourceType>>,
    joins: BTreeMap<ResourceType, JoinDescriptor>,
    soft_delete: BTreeSet<ResourceType>,
}

impl HierarchyConfig {
    /// The built-in EvalHub hierarchy. Equivalent to
    /// `from_declaration(&HierarchyDeclaration::default())`.
    pub fn standard() -> Self {
        use ResourceType as T;
        Self {
            parents: BTreeMap::from([
                (T::Institution, None),
                (T::User, Some(T::Institution)),
                (T::Evaluation, Some(T::Institution)),
                (T::Question, Some(T::Institution)),
                (T::EvaluationQuestion, Some(T::Evaluation)),
                (T::Answer, Some(T::EvaluationQuestion)),
            ]),
            joins: BTreeMap::from([(
                T::EvaluationQuestion,
                JoinDescriptor {
                    resource: T::EvaluationQuestion,
                    side_a: T::Evaluation,
                    side_b: T::Question,
                },
            )]),
            soft_delete: BTreeSet::from([T::Evaluation, T::Question]),
        }
    }

    pub fn from_declaration(decl: &HierarchyDeclaration) -> Result<Self, HierarchyError> {
        Self::from_parts(
            decl.edges
                .iter()
                .map(|(k, v)| (k.as_str(), v.iter().map(String::as_str).collect())),
            decl.join_resources
                .iter()
                .map(|(k, v)| (k.as_str(), v.iter().map(String::as_str).collect())),
            decl.soft_delete.iter().map(String::as_str),
        )
    }

    /// Builds and validates a graph from raw `(name, names)` pairs.
    pub fn from_parts<'a>(
        edges: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>,
        joins: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>,
        soft_delete: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, HierarchyError> {
        let mut parents = BTreeMap::new();
        for (child, declared) in edges {
            let child = parse_type(child)?;
            let parent = match declared.as_slice() {
                [] => None,
                [parent] => Some(parse_type(parent)?),
                _ => return Err(HierarchyError::MultipleParents(child)),
            };
            if parents.insert(child, parent).is_some() {
                return Err(HierarchyError::DuplicateDeclaration(child));
            }
        }

        if let Some(ty) = ResourceType::ALL.into_iter().find(|ty| !parents.contains_key(ty)) {
            return Err(HierarchyError::Undeclared(ty));
        }

        for start in ResourceType::ALL {
            let mut current = parents.get(&start).copied().flatten();
            let mut steps = 0;
            while let Some(ty) = current {
                steps += 1;
                if ty == start || steps > ResourceType::ALL.len() {
                    return Err(HierarchyError::Cycle(start));
                }
                current = parents.get(&ty).copied().flatten();
            }
        }

        for (&child, &parent) in &parents {
            match parent {
                Some(parent) if !child.has_foreign_key(parent) => {
                    return Err(HierarchyError::MissingForeignKey { child, parent });
                }
                _ => {}
            }
        }

        let mut join_map = BTreeMap::new();
        for (name, sides) in joins {
            let resource = parse_type(name)?;
            let [a, b] = sides.as_slice() else {
                return Err(HierarchyError::InvalidJoinSides(resource));
            };
            let (side_a, side_b) = (parse_type(a)?, parse_type(b)?);
            if side_a == side_b {
                return Err(HierarchyError::InvalidJoinSides(resource));
            }
            for side in [side_a, side_b] {
                if !resource.has_foreign_key(side) {
                    return Err(HierarchyError::MissingForeignKey {
                        child: resource,
                        parent: side,
                    });
                }
            }
            if parents.get(&resource).copied().flatten() != Some(side_a) {
                return Err(HierarchyError::JoinSideNotParent {
                    resource,
                    side: side_a,
                });
            }
            join_map.insert(
                resource,
                JoinDescriptor {
                    resource,
                    side_a,
                    side_b,
                },
            );
        }

        let mut soft = BTreeSet::new();
        for name in soft_delete {
            let ty = parse_type(name)?;
            if !ty.has_deleted_at() {
                return Err(HierarchyError::SoftDeleteUnsupported(ty));
            }
            soft.insert(ty);
        }

        tracing::debug!(
            types = parents.len(),
            joins = join_map.len(),
            soft_delete = soft.len(),
            "resource hierarchy validated"
        );

        Ok(Self {
            parents,
            joins: join_map,
            soft_delete: soft,
        })
    }

    pub fn parent_of(&self, ty: ResourceType) -> Option<ResourceType> {
        self.parents.get(&ty).copied().flatten()
    }

    /// `[ty, parent, grandparent, ...]` up to the root.
    pub fn ancestry(&self, ty: ResourceType) -> Vec<ResourceType> {
        let mut chain = vec![ty];
        let mut current = self.parent_of(ty);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    pub fn supports_restore(&self, ty: ResourceType) -> bool {
        self.soft_delete.contains(&ty)
    }

    pub fn soft_delete_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.soft_delete.iter().copied()
    }

    pub fn join_descriptor(&self, ty: ResourceType) -> Option<JoinDescriptor> {
        self.joins.get(&ty).copied()
    }

    pub fn is_join_resource(&self, ty: ResourceType) -> bool {
        self.joins.contains_key(&ty)
    }

    pub fn join_resources(&self) -> impl Iterator<Item = &JoinDescriptor> {
        self.joins.values()
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn parse_type(name: &str) -> Result<ResourceType, HierarchyError> {
    name.parse()
        .map_err(|_| HierarchyError::UnknownType(name.to_string()))
}
