use axum::extract::State;
use evalhub_api::ApiResponse;
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::{Record, ResourceType};
use evalhub_storage::RecordFilter;
use serde_json::Value;

use super::{ApiResult, JsonBody, draft, merge, permit, wrap};
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

const PERMITTED: &[&str] = &["question_text", "question_type", "options"];

pub async fn index(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    policy::require_same_tenant(&principal, &chain)?;

    let filter = RecordFilter::new().referencing(ResourceType::Institution, chain.target().id());
    let mut questions = Vec::new();
    for question in state.storage.list(ResourceType::Question, &filter).await? {
        questions.push(summary(&state, &question).await?);
    }
    Ok(ApiResponse::ok(
        "Questions retrieved successfully",
        wrap("questions", questions),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Question, &params, ResolveAction::Read)
        .await?;
    policy::require_same_tenant(&principal, &chain)?;
    Ok(ApiResponse::ok(
        "Question retrieved successfully",
        wrap("question", summary(&state, chain.target()).await?),
    ))
}

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

    let mut attributes = permit(&body.resource("question"), PERMITTED);
    attributes.insert(
        ResourceType::Institution.id_param(),
        Value::from(chain.target().id().get()),
    );
    let question = state
        .storage
        .create(draft(ResourceType::Question, attributes, &["question_text"])?)
        .await?;
    tracing::info!(question_id = %question.id(), "question created");
    Ok(ApiResponse::created(
        "Question created successfully",
        wrap("question", question.to_json()),
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
        .resolve(ResourceType::Question, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let attributes = permit(&body.resource("question"), PERMITTED);
    let updated = state
        .storage
        .update(merge(chain.target(), &attributes)?)
        .await?;
    Ok(ApiResponse::ok(
        "Question updated successfully",
        wrap("question", updated.to_json()),
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Question, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let id = chain.target().id();
    state.storage.delete(ResourceType::Question, id).await?;
    tracing::info!(question_id = %id, user_id = %principal.id, "question deleted");
    Ok(ApiResponse::message("Question deleted successfully"))
}

pub async fn restore(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Question, &params, ResolveAction::Restore)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let restored = state
        .storage
        .restore(ResourceType::Question, chain.target().id())
        .await?;
    Ok(ApiResponse::ok(
        "Question restored successfully",
        wrap("question", restored.to_json()),
    ))
}

/// The question's columns plus how many evaluations use it.
async fn summary(state: &AppState, question: &Record) -> Result<Value, evalhub_api::ApiError> {
    let filter = RecordFilter::new().referencing(ResourceType::Question, question.id());
    let links = state
        .storage
        .list(ResourceType::EvaluationQuestion, &filter)
        .await?;
    let mut json = question.to_json();
    if let Value::Object(map) = &mut json {
        map.insert("total_evaluations".into(), Value::from(links.len()));
    }
    Ok(json)
}
