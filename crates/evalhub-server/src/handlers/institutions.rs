use axum::extract::State;
use evalhub_api::ApiResponse;
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::ResourceType;
use evalhub_storage::RecordFilter;

use super::{ApiResult, JsonBody, draft, merge, permit, to_json_list, wrap};
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

const PERMITTED: &[&str] = &["name", "description"];

pub async fn index(State(state): State<AppState>) -> ApiResult {
    let institutions = state
        .storage
        .list(ResourceType::Institution, &RecordFilter::new())
        .await?;
    Ok(ApiResponse::ok(
        "Institutions retrieved successfully",
        wrap("institutions", to_json_list(&institutions)),
    ))
}

pub async fn show(State(state): State<AppState>, params: RequestParams) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    Ok(ApiResponse::ok(
        "Institution retrieved successfully",
        wrap("institution", chain.target().to_json()),
    ))
}

pub async fn create(State(state): State<AppState>, body: JsonBody) -> ApiResult {
    let attributes = permit(&body.resource("institution"), PERMITTED);
    let institution = state
        .storage
        .create(draft(ResourceType::Institution, attributes, &["name"])?)
        .await?;
    tracing::info!(institution_id = %institution.id(), "institution created");
    Ok(ApiResponse::created(
        "Institution created successfully",
        wrap("institution", institution.to_json()),
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
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    policy::require_instructor(&principal)?;
    policy::require_same_tenant(&principal, &chain)?;

    let attributes = permit(&body.resource("institution"), PERMITTED);
    let updated = state
        .storage
        .update(merge(chain.target(), &attributes)?)
        .await?;
    Ok(ApiResponse::ok(
        "Institution updated successfully",
        wrap("institution", updated.to_json()),
    ))
}

/// Removes the institution and everything beneath it.
pub async fn destroy(
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

    let id = chain.target().id();
    state.storage.delete(ResourceType::Institution, id).await?;
    tracing::info!(institution_id = %id, user_id = %principal.id, "institution deleted");
    Ok(ApiResponse::message("Institution deleted successfully"))
}
