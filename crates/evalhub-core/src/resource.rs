use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::ResourceId;

/// The closed set of resource kinds EvalHub stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Institution,
    User,
    Evaluation,
    Question,
    EvaluationQuestion,
    Answer,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Institution,
        ResourceType::User,
        ResourceType::Evaluation,
        ResourceType::Question,
        ResourceType::EvaluationQuestion,
        ResourceType::Answer,
    ];

    /// Snake-case name used in configuration and request parameters.
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceType::Institution => "institution",
            ResourceType::User => "user",
            ResourceType::Evaluation => "evaluation",
            ResourceType::Question => "question",
            ResourceType::EvaluationQuestion => "evaluation_question",
            ResourceType::Answer => "answer",
        }
    }

    /// CamelCase name used in error messages.
    pub const fn class_name(self) -> &'static str {
        match self {
            ResourceType::Institution => "Institution",
            ResourceType::User => "User",
            ResourceType::Evaluation => "Evaluation",
            ResourceType::Question => "Question",
            ResourceType::EvaluationQuestion => "EvaluationQuestion",
            ResourceType::Answer => "Answer",
        }
    }

    /// Sentence-case name, e.g. `"Evaluation question"`.
    pub const fn humanized(self) -> &'static str {
        match self {
            ResourceType::Institution => "Institution",
            ResourceType::User => "User",
            ResourceType::Evaluation => "Evaluation",
            ResourceType::Question => "Question",
            ResourceType::EvaluationQuestion => "Evaluation question",
            ResourceType::Answer => "Answer",
        }
    }

    /// Name of the request parameter / foreign key column that refers to this type.
    pub fn id_param(self) -> String {
        format!("{}_id", self.as_str())
    }

    /// Resource types this type holds a foreign key to.
    pub const fn foreign_keys(self) -> &'static [ResourceType] {
        match self {
            ResourceType::Institution => &[],
            ResourceType::User | ResourceType::Evaluation | ResourceType::Question => {
                &[ResourceType::Institution]
            }
            ResourceType::EvaluationQuestion => {
                &[ResourceType::Evaluation, ResourceType::Question]
            }
            ResourceType::Answer => &[ResourceType::User, ResourceType::EvaluationQuestion],
        }
    }

    pub fn has_foreign_key(self, target: ResourceType) -> bool {
        self.foreign_keys().contains(&target)
    }

    /// Whether rows of this type carry a `deleted_at` column.
    pub const fn has_deleted_at(self) -> bool {
        matches!(self, ResourceType::Evaluation | ResourceType::Question)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| CoreError::invalid_resource_type(s))
    }
}

/// A resolved `(type, id)` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub id: ResourceId,
}

impl ResourceRef {
    pub const fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self { resource_type, id }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type.class_name(), self.id)
    }
}
