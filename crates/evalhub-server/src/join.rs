//! Generic create/update/destroy for many-to-many join resources.

use std::sync::Arc;

use evalhub_api::ApiError;
use evalhub_core::{
    HierarchyConfig, JoinDescriptor, NewRecord, Record, ResourceId, ResourceType,
};
use evalhub_storage::{DynStorage, RecordFilter, StorageError};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("Invalid resource type")]
    Unregistered(ResourceType),

    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("{} not found", .resource_type.humanized())]
    NotFound { resource_type: ResourceType },

    #[error("{0}")]
    InvalidAttributes(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JoinError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_unique_violation())
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::Unregistered(_)
            | JoinError::MissingParameter { .. }
            | JoinError::InvalidAttributes(_) => ApiError::bad_request(err.to_string()),
            JoinError::NotFound { .. } => ApiError::not_found(err.to_string()),
            JoinError::Storage(storage) => storage.into(),
        }
    }
}

/// Works on any resource registered in the join registry.
///
/// Side A always comes from the path. Side B is read from the body on create
/// and from the path on update and destroy.
#[derive(Clone)]
pub struct JoinResourceHandler {
    hierarchy: Arc<HierarchyConfig>,
    storage: DynStorage,
}

impl JoinResourceHandler {
    pub fn new(hierarchy: Arc<HierarchyConfig>, storage: DynStorage) -> Self {
        Self { hierarchy, storage }
    }

    pub fn descriptor(&self, resource_type: ResourceType) -> Result<JoinDescriptor, JoinError> {
        self.hierarchy
            .join_descriptor(resource_type)
            .ok_or(JoinError::Unregistered(resource_type))
    }

    /// Reads `{side_b}_id` from `body`.
    pub fn side_b_id(
        &self,
        resource_type: ResourceType,
        body: &Map<String, Value>,
    ) -> Result<ResourceId, JoinError> {
        let descriptor = self.descriptor(resource_type)?;
        let param = descriptor.side_b.id_param();
        let raw = body.get(&param).filter(|v| !is_blank(v));
        let Some(raw) = raw else {
            return Err(JoinError::MissingParameter { param });
        };
        parse_id(raw).ok_or_else(|| JoinError::InvalidAttributes(format!("{param} is invalid")))
    }

    /// Creates the join row linking `side_a_id` to the side B id named in `body`.
    /// Any side A id in `body` is ignored.
    pub async fn create(
        &self,
        resource_type: ResourceType,
        side_a_id: ResourceId,
        body: &Map<String, Value>,
    ) -> Result<Record, JoinError> {
        let descriptor = self.descriptor(resource_type)?;
        let side_b_id = self.side_b_id(resource_type, body)?;

        let mut columns = permitted(&descriptor, body);
        columns.insert(descriptor.side_a.id_param(), Value::from(side_a_id.get()));
        columns.insert(descriptor.side_b.id_param(), Value::from(side_b_id.get()));

        let draft = NewRecord::from_json(resource_type, Value::Object(columns))
            .map_err(|e| JoinError::InvalidAttributes(e.to_string()))?;
        let record = self.storage.create(draft).await?;
        tracing::debug!(
            resource = %resource_type,
            id = %record.id(),
            side_a = %side_a_id,
            side_b = %side_b_id,
            "join row created"
        );
        Ok(record)
    }

    /// The row linking `side_a_id` and `side_b_id`.
    pub async fn find(
        &self,
        resource_type: ResourceType,
        side_a_id: ResourceId,
        side_b_id: ResourceId,
    ) -> Result<Record, JoinError> {
        let descriptor = self.descriptor(resource_type)?;
        let filter = RecordFilter::new()
            .referencing(descriptor.side_a, side_a_id)
            .referencing(descriptor.side_b, side_b_id);
        self.storage
            .first(resource_type, &filter)
            .await?
            .ok_or(JoinError::NotFound { resource_type })
    }

    pub async fn update(
        &self,
        resource_type: ResourceType,
        side_a_id: ResourceId,
        side_b_id: ResourceId,
        attributes: &Map<String, Value>,
    ) -> Result<Record, JoinError> {
        let descriptor = self.descriptor(resource_type)?;
        let current = self.find(resource_type, side_a_id, side_b_id).await?;
        let updated = current
            .merged(&permitted(&descriptor, attributes))
            .map_err(|e| JoinError::InvalidAttributes(e.to_string()))?;
        Ok(self.storage.update(updated).await?)
    }

    pub async fn destroy(
        &self,
        resource_type: ResourceType,
        side_a_id: ResourceId,
        side_b_id: ResourceId,
    ) -> Result<Record, JoinError> {
        let record = self.find(resource_type, side_a_id, side_b_id).await?;
        self.storage.delete(resource_type, record.id()).await?;
        tracing::debug!(resource = %resource_type, id = %record.id(), "join row deleted");
        Ok(record)
    }
}

/// `body` without the id columns.
fn permitted(descriptor: &JoinDescriptor, body: &Map<String, Value>) -> Map<String, Value> {
    let side_a = descriptor.side_a.id_param();
    let side_b = descriptor.side_b.id_param();
    body.iter()
        .filter(|(key, _)| key.as_str() != "id" && **key != side_a && **key != side_b)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn parse_id(value: &Value) -> Option<ResourceId> {
    match value {
        Value::Number(n) => n.as_u64().map(ResourceId::new),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalhub_core::{
        EvaluationQuestion, Model, NewEvaluation, NewInstitution, NewQuestion, QuestionType,
    };
    use evalhub_db_memory::InMemoryStorage;
    use serde_json::json;

    const EQ: ResourceType = ResourceType::EvaluationQuestion;

    struct Fixture {
        joins: JoinResourceHandler,
        evaluation: ResourceId,
        questions: Vec<ResourceId>,
    }

    async fn fixture() -> Fixture {
        let storage: DynStorage = Arc::new(InMemoryStorage::new());
        let institution = storage
            .create(
                NewInstitution {
                    name: "Acme".into(),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap()
            .id();
        let evaluation = storage
            .create(
                NewEvaluation {
                    institution_id: institution,
                    name: "Final".into(),
                    description: None,
                    is_active: true,
                    access_code: None,
                }
                .into(),
            )
            .await
            .unwrap()
            .id();
        let mut questions = Vec::new();
        for text in ["One?", "Two?"] {
            let question = storage
                .create(
                    NewQuestion {
                        institution_id: institution,
                        question_text: text.into(),
                        question_type: QuestionType::Text,
                        options: vec![],
                    }
                    .into(),
                )
                .await
                .unwrap();
            questions.push(question.id());
        }
        Fixture {
            joins: JoinResourceHandler::new(Arc::new(HierarchyConfig::standard()), storage),
            evaluation,
            questions,
        }
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn create_reads_side_b_from_body_and_fills_position() {
        let fx = fixture().await;
        let first = fx
            .joins
            .create(EQ, fx.evaluation, &body(json!({"question_id": fx.questions[0]})))
            .await
            .unwrap();
        // A side A id in the body does not redirect the row.
        let second = fx
            .joins
            .create(
                EQ,
                fx.evaluation,
                &body(json!({"question_id": fx.questions[1].to_string(), "evaluation_id": 999})),
            )
            .await
            .unwrap();

        let first = EvaluationQuestion::from_record(first).unwrap();
        let second = EvaluationQuestion::from_record(second).unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(second.evaluation_id, fx.evaluation);
    }

    #[tokio::test]
    async fn create_requires_side_b() {
        let fx = fixture().await;
        let err = fx
            .joins
            .create(EQ, fx.evaluation, &body(json!({"position": 3})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: question_id");
        assert_eq!(
            ApiError::from(err).status_code(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn duplicate_pair_conflicts() {
        let fx = fixture().await;
        let pair = body(json!({"question_id": fx.questions[0]}));
        fx.joins.create(EQ, fx.evaluation, &pair).await.unwrap();
        let err = fx.joins.create(EQ, fx.evaluation, &pair).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(
            ApiError::from(err).status_code(),
            axum::http::StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn update_and_destroy_locate_by_pair() {
        let fx = fixture().await;
        fx.joins
            .create(EQ, fx.evaluation, &body(json!({"question_id": fx.questions[0]})))
            .await
            .unwrap();

        let updated = fx
            .joins
            .update(
                EQ,
                fx.evaluation,
                fx.questions[0],
                &body(json!({"position": 7, "is_modified": true, "question_id": 42})),
            )
            .await
            .unwrap();
        let updated = EvaluationQuestion::from_record(updated).unwrap();
        assert_eq!(updated.position, 7);
        assert!(updated.is_modified);
        assert_eq!(updated.question_id, fx.questions[0]);

        let err = fx
            .joins
            .update(EQ, fx.evaluation, fx.questions[1], &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Evaluation question not found");

        fx.joins
            .destroy(EQ, fx.evaluation, fx.questions[0])
            .await
            .unwrap();
        assert!(matches!(
            fx.joins.destroy(EQ, fx.evaluation, fx.questions[0]).await,
            Err(JoinError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_attributes_are_rejected() {
        let fx = fixture().await;
        fx.joins
            .create(EQ, fx.evaluation, &body(json!({"question_id": fx.questions[0]})))
            .await
            .unwrap();
        let err = fx
            .joins
            .update(
                EQ,
                fx.evaluation,
                fx.questions[0],
                &body(json!({"position": "first"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::InvalidAttributes(_)));
    }

    #[tokio::test]
    async fn unregistered_type_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .joins
            .create(ResourceType::Answer, fx.evaluation, &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid resource type");
    }
}
