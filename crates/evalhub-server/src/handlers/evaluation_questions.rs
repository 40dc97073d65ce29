//! The evaluation/question join, driven through [`JoinResourceHandler`].
//!
//! [`JoinResourceHandler`]: crate::join::JoinResourceHandler

use axum::extract::State;
use evalhub_api::{ApiError, ApiResponse};
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::{Record, ResolvedChain, ResourceId, ResourceType};
use evalhub_storage::FindScope;
use serde_json::Value;

use super::evaluations::ordered_questions;
use super::{ApiResult, JsonBody, wrap};
use crate::join::JoinError;
use crate::resolver::{RequestParams, ResolveAction, ResolveError};
use crate::server::AppState;

const JOIN: ResourceType = ResourceType::EvaluationQuestion;

async fn managed_evaluation(
    state: &AppState,
    principal: &evalhub_core::Principal,
    params: &RequestParams,
) -> Result<ResolvedChain, ApiError> {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, params, ResolveAction::Read)
        .await?;
    policy::require_management(principal, &chain)?;
    Ok(chain)
}

pub async fn index(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = managed_evaluation(&state, &principal, &params).await?;
    let links: Vec<Value> = ordered_questions(&state, chain.target().id())
        .await?
        .into_iter()
        .map(|(link, question)| {
            let mut json = Record::from(link).to_json();
            if let Value::Object(map) = &mut json {
                map.insert("question".into(), Record::from(question).to_json());
            }
            json
        })
        .collect();
    Ok(ApiResponse::ok(
        "Evaluation questions retrieved successfully",
        wrap("evaluation_questions", links),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(JOIN, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_access(&principal, &chain)?;
    Ok(ApiResponse::ok(
        "Evaluation question retrieved successfully",
        wrap("evaluation_question", with_question(&state, chain.target()).await?),
    ))
}

/// Links the question named by `question_id` in the body. The question must
/// belong to the evaluation's institution.
pub async fn create(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = managed_evaluation(&state, &principal, &params).await?;
    let attributes = body.resource("evaluation_question");

    let question_id = state.joins.side_b_id(JOIN, &attributes)?;
    let question = state
        .storage
        .find(ResourceType::Question, question_id, FindScope::Active)
        .await?;
    let same_institution = question
        .as_ref()
        .and_then(|q| q.foreign_key(ResourceType::Institution))
        == chain.institution_id();
    if question.is_none() || !same_institution {
        return Err(ResolveError::NotFound {
            resource_type: ResourceType::Question,
            id: question_id.to_string(),
        }
        .into());
    }

    let link = state
        .joins
        .create(JOIN, chain.target().id(), &attributes)
        .await?;
    Ok(ApiResponse::created(
        "Question added to evaluation successfully",
        wrap("evaluation_question", with_question(&state, &link).await?),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = managed_evaluation(&state, &principal, &params).await?;
    let question_id = path_question_id(&params)?;
    let link = state
        .joins
        .update(
            JOIN,
            chain.target().id(),
            question_id,
            &body.resource("evaluation_question"),
        )
        .await?;
    Ok(ApiResponse::ok(
        format!("{} updated successfully", JOIN.humanized()),
        wrap("evaluation_question", with_question(&state, &link).await?),
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = managed_evaluation(&state, &principal, &params).await?;
    let question_id = path_question_id(&params)?;
    state
        .joins
        .destroy(JOIN, chain.target().id(), question_id)
        .await?;
    Ok(ApiResponse::message(format!(
        "{} deleted successfully",
        JOIN.humanized()
    )))
}

// A non-numeric id can never name an existing pair.
fn path_question_id(params: &RequestParams) -> Result<ResourceId, JoinError> {
    params
        .id_of(ResourceType::Question)
        .ok_or(JoinError::NotFound { resource_type: JOIN })
}

async fn with_question(state: &AppState, link: &Record) -> Result<Value, ApiError> {
    let question = match link.foreign_key(ResourceType::Question) {
        Some(id) => state
            .storage
            .find(ResourceType::Question, id, FindScope::WithDeleted)
            .await?
            .map(|q| q.to_json()),
        None => None,
    };
    let mut json = link.to_json();
    if let Value::Object(map) = &mut json {
        map.insert("question".into(), question.unwrap_or(Value::Null));
    }
    Ok(json)
}
