use std::collections::HashMap;

use axum::extract::State;
use evalhub_api::{ApiError, ApiResponse};
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::{
    Answer, Evaluation, EvaluationQuestion, Model, NewAnswer, Principal, Question, Record,
    ResourceId, ResourceType, validate_answer,
};
use evalhub_storage::{FindScope, RecordFilter, StorageError, Transaction};
use serde_json::{Map, Value, json};

use super::evaluations::ordered_questions;
use super::{ApiResult, JsonBody, merge, permit};
use crate::join::parse_id;
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

pub const ALREADY_ANSWERED: &str = "You have already answered this question";

const PERMITTED: &[&str] = &["answer_text", "selected_options"];

/// The caller's own answers within an evaluation.
pub async fn index(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_access(&principal, &chain)?;

    let questions: HashMap<ResourceId, Question> = ordered_questions(&state, chain.target().id())
        .await?
        .into_iter()
        .map(|(link, question)| (link.id, question))
        .collect();
    let filter = RecordFilter::new().referencing(ResourceType::User, principal.id);
    let answers: Vec<Value> = state
        .storage
        .list(ResourceType::Answer, &filter)
        .await?
        .into_iter()
        .filter_map(Answer::from_record)
        .filter_map(|answer| {
            let question = questions.get(&answer.evaluation_question_id)?;
            Some(answer_data(&answer, question))
        })
        .collect();

    let Some(evaluation) = chain.target_as::<Evaluation>() else {
        return Err(ApiError::internal("evaluation chain without evaluation"));
    };
    Ok(ApiResponse::ok(
        "Answers retrieved successfully",
        json!({
            "evaluation": {"id": evaluation.id, "name": evaluation.name},
            "answers": answers,
        }),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let (answer, question) = owned_answer(&state, &principal, &params).await?;
    Ok(ApiResponse::ok(
        "Answer retrieved successfully",
        answer_data(&answer, &question),
    ))
}

/// Answers one evaluation question. A second answer by the same user is a
/// conflict whether caught by the pre-check or by the unique index.
pub async fn create(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::EvaluationQuestion, &params, ResolveAction::Read)
        .await?;
    policy::require_access(&principal, &chain)?;
    let Some(link) = chain.target_as::<EvaluationQuestion>() else {
        return Err(ApiError::internal("chain target is not an evaluation question"));
    };

    let existing = RecordFilter::new()
        .referencing(ResourceType::User, principal.id)
        .referencing(ResourceType::EvaluationQuestion, link.id);
    if state
        .storage
        .first(ResourceType::Answer, &existing)
        .await?
        .is_some()
    {
        tracing::debug!(
            user_id = %principal.id,
            evaluation_question_id = %link.id,
            "duplicate answer rejected"
        );
        return Err(ApiError::conflict(ALREADY_ANSWERED));
    }

    let question = question_of(&state, link).await?;
    let draft = answer_draft(&principal, link.id, &body.resource("answer"))?;
    validate_answer(
        question.question_type,
        draft.answer_text.as_deref(),
        &draft.selected_options,
    )
    .into_result()?;

    let created = state
        .storage
        .create(draft.into())
        .await
        .map_err(already_answered)?;
    let Some(answer) = Answer::from_record(created) else {
        return Err(ApiError::internal("answer insert returned another resource"));
    };
    tracing::info!(answer_id = %answer.id, user_id = %principal.id, "answer created");
    Ok(ApiResponse::created(
        "Answer created successfully",
        answer_data(&answer, &question),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let (answer, question) = owned_answer(&state, &principal, &params).await?;
    let attributes = permit(&body.resource("answer"), PERMITTED);
    let merged = merge(&Record::from(answer), &attributes)?;
    if let Record::Answer(candidate) = &merged {
        validate_answer(
            question.question_type,
            candidate.answer_text.as_deref(),
            &candidate.selected_options,
        )
        .into_result()?;
    }

    let updated = state.storage.update(merged).await?;
    let Some(answer) = Answer::from_record(updated) else {
        return Err(ApiError::internal("answer update returned another resource"));
    };
    Ok(ApiResponse::ok(
        "Answer updated successfully",
        answer_data(&answer, &question),
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let (answer, _) = owned_answer(&state, &principal, &params).await?;
    state.storage.delete(ResourceType::Answer, answer.id).await?;
    tracing::info!(answer_id = %answer.id, user_id = %principal.id, "answer deleted");
    Ok(ApiResponse::message("Answer deleted successfully"))
}

/// Submits many answers in one transaction.
///
/// Rows are checked in order and every failure is collected. If any row
/// fails nothing is persisted and the response lists all failures.
pub async fn bulk_create(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Evaluation, &params, ResolveAction::Read)
        .await?;
    policy::require_access(&principal, &chain)?;
    let evaluation_id = chain.target().id();

    let rows: Vec<Map<String, Value>> = match body.0.get("answers") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_object().cloned().unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    };

    let mut tx = state.storage.begin_transaction().await?;
    let outcome = submit_rows(tx.as_mut(), &principal, evaluation_id, &rows).await;
    let (created, errors) = match outcome {
        Ok(result) => result,
        Err(e) => {
            tx.rollback().await?;
            return Err(e.into());
        }
    };

    if !errors.is_empty() {
        tx.rollback().await?;
        tracing::debug!(
            user_id = %principal.id,
            evaluation_id = %evaluation_id,
            failures = errors.len(),
            "bulk submission rejected"
        );
        return Err(ApiError::validation_messages(errors));
    }
    tx.commit().await?;

    tracing::info!(
        user_id = %principal.id,
        evaluation_id = %evaluation_id,
        count = created.len(),
        "bulk submission stored"
    );
    let data: Vec<Value> = created
        .iter()
        .map(|(answer, question)| answer_data(answer, question))
        .collect();
    Ok(ApiResponse::created(
        format!("Successfully submitted {} answers", created.len()),
        Value::Array(data),
    ))
}

type Submitted = (Vec<(Answer, Question)>, Vec<String>);

async fn submit_rows(
    tx: &mut dyn Transaction,
    principal: &Principal,
    evaluation_id: ResourceId,
    rows: &[Map<String, Value>],
) -> Result<Submitted, StorageError> {
    let mut created = Vec::new();
    let mut errors = Vec::new();

    for row in rows {
        let raw_id = row.get("evaluation_question_id").cloned().unwrap_or(Value::Null);
        let link = match parse_id(&raw_id) {
            Some(id) => tx
                .find(ResourceType::EvaluationQuestion, id, FindScope::Active)
                .await?
                .and_then(EvaluationQuestion::from_record)
                .filter(|link| link.evaluation_id == evaluation_id),
            None => None,
        };
        let Some(link) = link else {
            errors.push(format!("Evaluation question {} not found", display_raw(&raw_id)));
            continue;
        };
        let Some(question) = tx
            .find(ResourceType::Question, link.question_id, FindScope::WithDeleted)
            .await?
            .and_then(Question::from_record)
        else {
            errors.push(format!("Evaluation question {} not found", link.id));
            continue;
        };

        let existing = RecordFilter::new()
            .referencing(ResourceType::User, principal.id)
            .referencing(ResourceType::EvaluationQuestion, link.id);
        if !tx.list(ResourceType::Answer, &existing).await?.is_empty() {
            errors.push(format!("Already answered question: {}", question.question_text));
            continue;
        }

        let draft = match answer_draft(principal, link.id, row) {
            Ok(draft) => draft,
            Err(e) => {
                errors.push(e.public_message().to_string());
                continue;
            }
        };
        let shape = validate_answer(
            question.question_type,
            draft.answer_text.as_deref(),
            &draft.selected_options,
        );
        if !shape.is_empty() {
            errors.extend(shape.full_messages());
            continue;
        }

        match tx.create(draft.into()).await {
            Ok(record) => {
                if let Some(answer) = Answer::from_record(record) {
                    created.push((answer, question));
                }
            }
            Err(StorageError::Validation(invalid)) => errors.extend(invalid.full_messages()),
            Err(e) if e.is_unique_violation() => {
                errors.push(format!("Already answered question: {}", question.question_text));
            }
            Err(e) => return Err(e),
        }
    }
    Ok((created, errors))
}

/// Resolves the answer chain and checks tenant access and ownership.
async fn owned_answer(
    state: &AppState,
    principal: &Principal,
    params: &RequestParams,
) -> Result<(Answer, Question), ApiError> {
    let chain = state
        .resolver
        .resolve(ResourceType::Answer, params, ResolveAction::Read)
        .await?;
    policy::require_access(principal, &chain)?;
    let (Some(answer), Some(link)) = (
        chain.target_as::<Answer>(),
        chain.find::<EvaluationQuestion>(),
    ) else {
        return Err(ApiError::internal("answer chain is incomplete"));
    };
    policy::require_ownership(principal, answer)?;
    let question = question_of(state, link).await?;
    Ok((answer.clone(), question))
}

// Soft-deleted questions still describe the answers given to them.
async fn question_of(state: &AppState, link: &EvaluationQuestion) -> Result<Question, ApiError> {
    state
        .storage
        .find(ResourceType::Question, link.question_id, FindScope::WithDeleted)
        .await?
        .and_then(Question::from_record)
        .ok_or_else(|| {
            StorageError::not_found(ResourceType::Question, link.question_id).into()
        })
}

fn answer_draft(
    principal: &Principal,
    evaluation_question_id: ResourceId,
    attributes: &Map<String, Value>,
) -> Result<NewAnswer, ApiError> {
    let mut columns = permit(attributes, PERMITTED);
    columns.insert("user_id".into(), Value::from(principal.id.get()));
    columns.insert(
        "evaluation_question_id".into(),
        Value::from(evaluation_question_id.get()),
    );
    serde_json::from_value(Value::Object(columns))
        .map_err(|e| ApiError::bad_request(format!("Invalid answer: {e}")))
}

fn already_answered(err: StorageError) -> ApiError {
    if err.is_unique_violation() {
        ApiError::conflict(ALREADY_ANSWERED)
    } else {
        err.into()
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text answers read as their text; choice answers as their options joined.
fn formatted_answer(answer: &Answer, question: &Question) -> String {
    if question.question_type.uses_options() {
        answer.selected_options.join(", ")
    } else {
        answer.answer_text.clone().unwrap_or_default()
    }
}

fn answer_data(answer: &Answer, question: &Question) -> Value {
    let mut json = Record::from(answer.clone()).to_json();
    if let Value::Object(map) = &mut json {
        map.insert(
            "question".into(),
            json!({
                "id": question.id,
                "question_text": question.question_text,
                "question_type": question.question_type,
                "options": question.options,
            }),
        );
        map.insert(
            "formatted_answer".into(),
            Value::String(formatted_answer(answer, question)),
        );
    }
    json
}
