use axum::extract::State;
use evalhub_api::{ApiError, ApiResponse};
use evalhub_auth::{BearerAuth, policy, verify_password};
use evalhub_core::{
    Institution, Model, NewUser, Principal, Record, ResourceType, Role, User, ValidationErrors,
};
use evalhub_storage::RecordFilter;
use serde_json::{Value, json};

use super::{ApiResult, JsonBody};
use crate::resolver::{RequestParams, ResolveAction};
use crate::server::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// `POST /api/institutions/{institution_id}/users/sign_in`
///
/// With an email the password is verified; without one a student is found
/// or created by name.
pub async fn sign_in(
    State(state): State<AppState>,
    params: RequestParams,
    body: JsonBody,
) -> ApiResult {
    let chain = state
        .resolver
        .resolve(ResourceType::Institution, &params, ResolveAction::Read)
        .await?;
    let Some(institution) = chain.target_as::<Institution>() else {
        return Err(ApiError::internal("institution chain without institution"));
    };
    let credentials = body.resource("user");
    let field = |name: &str| {
        credentials
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let user = match field("email") {
        Some(email) => {
            let password = credentials
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or_default();
            password_user(&state, institution, email, password).await?
        }
        None => student_user(&state, institution, field("name")).await?,
    };

    let principal = Principal::from(&user);
    let token = state.auth.authenticator.create_session(&principal).await?;
    tracing::info!(
        user_id = %user.id,
        institution_id = %institution.id,
        role = %user.role,
        "user signed in"
    );

    let mut data = serde_json::to_value(&token).map_err(|e| ApiError::internal(e.to_string()))?;
    if let Value::Object(map) = &mut data {
        map.insert(
            "user".into(),
            json!({
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.role,
                "institution": {"id": institution.id, "name": institution.name},
            }),
        );
        map.insert(
            "permissions".into(),
            json!(policy::permissions_for(user.role)),
        );
    }
    Ok(ApiResponse::ok("Authentication successful", data))
}

async fn password_user(
    state: &AppState,
    institution: &Institution,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let filter = RecordFilter::new()
        .referencing(ResourceType::Institution, institution.id)
        .with_attribute("email", email);
    let user = state
        .storage
        .first(ResourceType::User, &filter)
        .await?
        .and_then(User::from_record);
    let Some(user) = user else {
        tracing::debug!(institution_id = %institution.id, "sign-in for unknown email");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let verified = match user.password_hash.as_deref() {
        Some(hash) => verify_password(password, hash).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "stored password hash unreadable");
            false
        }),
        None => false,
    };
    if !verified {
        tracing::debug!(user_id = %user.id, "sign-in with wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }
    Ok(user)
}

async fn student_user(
    state: &AppState,
    institution: &Institution,
    name: Option<&str>,
) -> Result<User, ApiError> {
    let Some(name) = name else {
        return Err(ApiError::validation(ValidationErrors::single(
            "name",
            "can't be blank",
        )));
    };
    let filter = RecordFilter::new()
        .referencing(ResourceType::Institution, institution.id)
        .with_attribute("name", name)
        .with_attribute("role", Role::Student.as_str());
    if let Some(existing) = state
        .storage
        .first(ResourceType::User, &filter)
        .await?
        .and_then(User::from_record)
    {
        return Ok(existing);
    }

    let created = state
        .storage
        .create(
            NewUser {
                institution_id: institution.id,
                name: name.to_string(),
                email: None,
                role: Role::Student,
                password_hash: None,
            }
            .into(),
        )
        .await?;
    tracing::info!(user_id = %created.id(), institution_id = %institution.id, "student created");
    match created {
        Record::User(user) => Ok(user),
        _ => Err(ApiError::internal("user insert returned another resource")),
    }
}

/// `DELETE /api/users/sign_out`
pub async fn sign_out(
    State(state): State<AppState>,
    BearerAuth(principal): BearerAuth,
) -> ApiResult {
    state.auth.authenticator.invalidate(&principal).await?;
    tracing::info!(user_id = %principal.id, "user signed out");
    Ok(ApiResponse::message("Signed out successfully"))
}
