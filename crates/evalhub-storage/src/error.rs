//! Storage error types.

use std::fmt;

use evalhub_api::ApiError;
use evalhub_core::{ResourceId, ResourceType, ValidationErrors};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist (or is soft-deleted and not in scope).
    #[error("Couldn't find {} with ID={id}", .resource_type.class_name())]
    NotFound {
        resource_type: ResourceType,
        id: ResourceId,
    },

    /// A unique index rejected the write.
    #[error("{} violates unique index on ({})", .resource_type.class_name(), .columns.join(", "))]
    UniqueViolation {
        resource_type: ResourceType,
        columns: Vec<&'static str>,
    },

    /// A foreign key column points at a row that does not exist.
    #[error("{} references missing {field}", .resource_type.class_name())]
    ForeignKeyViolation {
        resource_type: ResourceType,
        field: String,
    },

    /// Single-record attribute validation failed.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// An error occurred during a transaction.
    #[error("Transaction error: {message}")]
    TransactionError { message: String },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(resource_type: ResourceType, id: ResourceId) -> Self {
        Self::NotFound { resource_type, id }
    }

    #[must_use]
    pub fn unique_violation(resource_type: ResourceType, columns: &[&'static str]) -> Self {
        Self::UniqueViolation {
            resource_type,
            columns: columns.to_vec(),
        }
    }

    #[must_use]
    pub fn foreign_key_violation(resource_type: ResourceType, target: ResourceType) -> Self {
        Self::ForeignKeyViolation {
            resource_type,
            field: target.as_str().to_string(),
        }
    }

    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::UniqueViolation { .. } => ErrorCategory::Conflict,
            Self::ForeignKeyViolation { .. } | Self::Validation(_) => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<ValidationErrors> for StorageError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transaction,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { resource_type, .. } => {
                ApiError::resource_not_found(err.to_string(), resource_type.class_name())
            }
            StorageError::UniqueViolation { resource_type, .. } => {
                ApiError::conflict(format!("{} already exists", resource_type.humanized()))
            }
            StorageError::ForeignKeyViolation { field, .. } => {
                ApiError::validation(ValidationErrors::single(field, "must exist"))
            }
            StorageError::Validation(errors) => ApiError::validation(errors),
            other => {
                tracing::error!(error = %other, category = %other.category(), "storage failure");
                ApiError::internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found(ResourceType::Evaluation, ResourceId::new(7));
        assert_eq!(err.to_string(), "Couldn't find Evaluation with ID=7");

        let err = StorageError::unique_violation(
            ResourceType::Answer,
            &["user_id", "evaluation_question_id"],
        );
        assert_eq!(
            err.to_string(),
            "Answer violates unique index on (user_id, evaluation_question_id)"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found(ResourceType::User, ResourceId::new(1)).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::unique_violation(ResourceType::Institution, &["name"]).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::foreign_key_violation(ResourceType::Answer, ResourceType::User).category(),
            ErrorCategory::Validation
        );
        assert_eq!(StorageError::internal("boom").category(), ErrorCategory::Internal);
    }

    #[test]
    fn maps_to_api_errors() {
        let api: ApiError =
            StorageError::unique_violation(ResourceType::EvaluationQuestion, &["evaluation_id"])
                .into();
        assert_eq!(api.status_code().as_u16(), 409);

        let api: ApiError =
            StorageError::foreign_key_violation(ResourceType::Answer, ResourceType::EvaluationQuestion)
                .into();
        let body = api.to_body();
        assert_eq!(body["status"], 422);
        assert_eq!(body["validation_errors"]["evaluation_question"][0], "must exist");

        let api: ApiError = StorageError::transaction_error("poisoned").into();
        assert_eq!(api.status_code().as_u16(), 500);
    }
}
