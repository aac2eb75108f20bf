//! Project CRUD endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    file_record::FileRecord,
    project::{CreateProject, Project},
};
use serde::Deserialize;
use tracing::warn;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub profile_id: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("project name is required".to_string()));
    }

    let project = Project::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_by_profile_id(&state.db().pool, &query.profile_id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_by_id(&state.db().pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// Delete a project, its file metadata, and the stored objects. Object
/// removal is best-effort; a failed removal does not block the delete.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let files = FileRecord::find_by_project_id(&state.db().pool, project_id).await?;
    for file in &files {
        if let Err(e) = state.storage().remove(&file.storage_path).await {
            warn!(
                storage_path = %file.storage_path,
                error = %e,
                "failed to remove object while deleting project"
            );
        }
    }

    let deleted = Project::delete(&state.db().pool, project_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("project"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/projects",
        Router::new()
            .route("/", post(create_project).get(list_projects))
            .route("/{project_id}", get(get_project).delete(delete_project)),
    )
}
