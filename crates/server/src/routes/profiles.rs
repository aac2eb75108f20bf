//! Profile and entitlement endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use chrono::Utc;
use db::models::profile::{EntitlementState, Profile};
use serde::{Deserialize, Serialize};
use services::services::entitlement::EntitlementService;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateSubscription {
    pub is_subscribed: bool,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = Profile::find_by_id(&state.db().pool, &id)
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// Current entitlement for an identity. Total: an unknown identity or a
/// failed lookup resolves to the denied state rather than an error.
pub async fn get_entitlement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<EntitlementState>>, ApiError> {
    let entitlement =
        EntitlementService::resolve_for_identity(&state.db().pool, &id, Utc::now()).await;
    Ok(ResponseJson(ApiResponse::success(entitlement)))
}

/// Billing collaborator write path for the subscribed flag.
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<UpdateSubscription>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = Profile::set_subscribed(&state.db().pool, &id, payload.is_subscribed)
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/profiles/{id}",
        Router::new()
            .route("/", get(get_profile))
            .route("/entitlement", get(get_entitlement))
            .route("/subscription", put(update_subscription)),
    )
}
