//! AI assistant endpoint, gated on entitlement.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
};
use db::models::project::Project;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::require_access};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AiQueryBody {
    pub profile_id: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AiQueryResult {
    pub response: String,
}

pub async fn ai_query(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<AiQueryBody>,
) -> Result<ResponseJson<ApiResponse<AiQueryResult>>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query is required".to_string()));
    }

    let project = Project::find_by_id(&state.db().pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    if project.profile_id != payload.profile_id {
        return Err(ApiError::NotFound("project"));
    }

    require_access(&state, &payload.profile_id).await?;

    let response = state.ai().analyze(project_id, &payload.query).await?;

    Ok(ResponseJson(ApiResponse::success(AiQueryResult {
        response,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/projects/{project_id}/ai-query", post(ai_query))
}
