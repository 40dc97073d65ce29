use std::collections::HashSet;

use axum::extract::State;
use evalhub_api::{ApiError, ApiResponse};
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::{
    Evaluation, EvaluationQuestion, Model, Question, ResourceId, ResourceType, User,
};
use evalhub_storage::{FindScope, RecordFilter};
use serde_json::{Value, json};

use super::{ApiResult, JsonBody, draft, merge, permit, to_json_list, wrap};
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

const PERMITTED: &[&str] = &["name", "description", "is_active"];

pub async fn index(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let filter = RecordFilter::new().referencing(ResourceType::Institution, chain.target().id());
    let evaluations = state.storage.list(ResourceType::Evaluation, &filter).await?;
    Ok(ApiResponse::ok(
        "Evaluations retrieved successfully",
        wrap("evaluations", to_json_list(&evaluations)),
    ))
}

/// Creates an evaluation with a fresh access code.
pub async fn create(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let mut attributes = permit(&body.resource("evaluation"), PERMITTED);
    attributes.insert(
        ResourceType::Institution.id_param(),
        Value::from(chain.target().id().get()),
    );
    let evaluation = state
        .storage
        .create(draft(ResourceType::Evaluation, attributes, &["name"])?)
        .await?;
    tracing::info!(
        evaluation_id = %evaluation.id(),
        institution_id = %chain.target().id(),
        "evaluation created"
    );
    Ok(ApiResponse::created(
        "Evaluation created successfully",
        wrap("evaluation", evaluation.to_json()),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_access(&principal, &chain)?;

    let questions = ordered_questions(&state, chain.target().id()).await?;
    let mut evaluation = chain.target().to_json();
    if let Value::Object(map) = &mut evaluation {
        let questions = questions
            .iter()
            .map(|(_, question)| {
                json!({
                    "id": question.id,
                    "question_text": question.question_text,
                    "question_type": question.question_type,
                    "options": question.options,
                })
            })
            .collect();
        map.insert("questions".into(), Value::Array(questions));
    }
    Ok(ApiResponse::ok(
        "Evaluation retrieved successfully",
        wrap("evaluation", evaluation),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_management(&principal, &chain)?;

    let attributes = permit(&body.resource("evaluation"), PERMITTED);
    let updated = state
        .storage
        .update(merge(chain.target(), &attributes)?)
        .await?;
    Ok(ApiResponse::ok(
        "Evaluation updated successfully",
        wrap("evaluation", updated.to_json()),
    ))
}

/// Soft delete; see [`restore`].
pub async fn destroy(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_management(&principal, &chain)?;

    let id = chain.target().id();
    state.storage.delete(ResourceType::Evaluation, id).await?;
    tracing::info!(evaluation_id = %id, user_id = %principal.id, "evaluation deleted");
    Ok(ApiResponse::message("Evaluation deleted successfully"))
}

pub async fn restore(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Restore)
        .await?;
    policy::require_management(&principal, &chain)?;

    let restored = state
        .storage
        .restore(ResourceType::Evaluation, chain.target().id())
        .await?;
    tracing::info!(evaluation_id = %restored.id(), user_id = %principal.id, "evaluation restored");
    Ok(ApiResponse::ok(
        "Evaluation restored successfully",
        wrap("evaluation", restored.to_json()),
    ))
}

/// Unauthenticated entry point for respondents. A supplied access code must
/// match the evaluation's.
pub async fn join(State(state): State<AppState>, params: RequestParams) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    let Some(evaluation) = chain.target_as::<Evaluation>() else {
        return Err(ApiError::internal("evaluation chain without evaluation"));
    };
    if let Some(code) = params.get("access_code") {
        if code != evaluation.access_code {
            tracing::debug!(evaluation_id = %evaluation.id, "join with wrong access code");
            return Err(ApiError::unauthorized("Invalid access code"));
        }
    }

    let questions: Vec<Value> = ordered_questions(&state, evaluation.id)
        .await?
        .into_iter()
        .map(|(link, question)| {
            json!({
                "id": link.id,
                "question_id": question.id,
                "question_text": question.question_text,
                "question_type": question.question_type,
                "options": question.options,
                "position": link.position,
            })
        })
        .collect();
    Ok(ApiResponse::ok(
        "Successfully joined evaluation",
        json!({"evaluation": evaluation, "questions": questions}),
    ))
}

/// Every answer submitted to the evaluation, with its author and question.
pub async fn responses(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_access(&principal, &chain)?;

    let mut responses = Vec::new();
    for (link, question) in ordered_questions(&state, chain.target().id()).await? {
        let filter = RecordFilter::new().referencing(ResourceType::EvaluationQuestion, link.id);
        for answer in state.storage.list(ResourceType::Answer, &filter).await? {
            let author = match answer.foreign_key(ResourceType::User) {
                Some(id) => state
                    .storage
                    .find(ResourceType::User, id, FindScope::Active)
                    .await?
                    .and_then(User::from_record),
                None => None,
            };
            let mut response = answer.to_json();
            if let Value::Object(map) = &mut response {
                map.insert(
                    "user".into(),
                    author.map_or(Value::Null, |u| json!({"id": u.id, "name": u.name})),
                );
                map.insert(
                    "evaluation_question".into(),
                    json!({
                        "id": link.id,
                        "position": link.position,
                        "question": {
                            "id": question.id,
                            "question_text": question.question_text,
                            "question_type": question.question_type,
                        },
                    }),
                );
            }
            responses.push(response);
        }
    }
    Ok(ApiResponse::ok(
        "Responses retrieved successfully",
        json!({ "responses": responses }),
    ))
}

/// The evaluation's links ordered by position, each with its question.
/// Links whose question is soft-deleted are skipped.
pub(crate) async fn ordered_questions(
    state: &AppState,
    evaluation_id: ResourceId,
) -> Result<Vec<(EvaluationQuestion, Question)>, ApiError> {
    let filter = RecordFilter::new().referencing(ResourceType::Evaluation, evaluation_id);
    let mut links: Vec<EvaluationQuestion> = state
        .storage
        .list(ResourceType::EvaluationQuestion, &filter)
        .await?
        .into_iter()
        .filter_map(EvaluationQuestion::from_record)
        .collect();
    links.sort_by_key(|link| (link.position, link.id));

    let ids: HashSet<ResourceId> = links.iter().map(|link| link.question_id).collect();
    let questions: Vec<Question> = state
        .storage
        .list(ResourceType::Question, &RecordFilter::new().with_ids(ids))
        .await?
        .into_iter()
        .filter_map(Question::from_record)
        .collect();

    Ok(links
        .into_iter()
        .filter_map(|link| {
            let question = questions.iter().find(|q| q.id == link.question_id)?.clone();
            Some((link, question))
        })
        .collect())
}
