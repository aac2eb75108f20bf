pub mod ai;
pub mod auth;
pub mod files;
pub mod profiles;
pub mod projects;

use chrono::Utc;
use db::models::profile::EntitlementState;
use services::services::entitlement::EntitlementService;

use crate::{AppState, error::ApiError};

/// Resolve the identity's entitlement and deny unless a trial or subscription
/// grants access.
pub(crate) async fn require_access(
    state: &AppState,
    identity_id: &str,
) -> Result<EntitlementState, ApiError> {
    let entitlement =
        EntitlementService::resolve_for_identity(&state.db().pool, identity_id, Utc::now()).await;

    if entitlement.grants_access() {
        Ok(entitlement)
    } else {
        Err(ApiError::FeatureGated(entitlement))
    }
}
