//! Sign-in and sign-out endpoints fed by the identity provider.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use chrono::Utc;
use db::models::profile::{EntitlementState, Profile};
use serde::{Deserialize, Serialize};
use services::services::{
    auth_events::IdentityEvent,
    entitlement::EntitlementService,
    provisioning::{IdentityDescriptor, ProfileProvisioner},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SignInResponse {
    pub profile: Profile,
    pub entitlement: EntitlementState,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SignOutRequest {
    pub identity_id: String,
}

/// Handle a successful authentication reported by the identity provider:
/// publish the identity-change event and make sure a profile exists so the
/// response can carry it together with the current entitlement.
pub async fn sign_in(
    State(state): State<AppState>,
    axum::Json(identity): axum::Json<IdentityDescriptor>,
) -> Result<ResponseJson<ApiResponse<SignInResponse>>, ApiError> {
    if identity.id.trim().is_empty() {
        return Err(ApiError::BadRequest("identity id is required".to_string()));
    }

    let profile = ProfileProvisioner::ensure_profile(&state.db().pool, &identity).await?;
    state
        .auth_events()
        .publish(IdentityEvent::SignedIn(identity));

    let entitlement = EntitlementService::resolve(Some(&profile), Utc::now());

    Ok(ResponseJson(ApiResponse::success(SignInResponse {
        profile,
        entitlement,
    })))
}

pub async fn sign_out(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<SignOutRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.auth_events().publish(IdentityEvent::SignedOut {
        identity_id: payload.identity_id,
    });
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/sign-in", post(sign_in))
            .route("/sign-out", post(sign_out)),
    )
}
