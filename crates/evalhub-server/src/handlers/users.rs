use axum::extract::State;
use evalhub_api::ApiResponse;
use evalhub_auth::{BearerAuth, policy};
use evalhub_core::ResourceType;

use super::{ApiResult, wrap};
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

/// `GET /api/institutions/{institution_id}/users/{id}`
pub async fn show(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
    params: RequestParams,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::User, &params, ResolveAction::Read)
        .await?;
    policy::require_same_tenant(&principal, &chain)?;
    Ok(ApiResponse::ok(
        "User retrieved successfully",
        wrap("user", chain.target().to_json()),
    ))
}
