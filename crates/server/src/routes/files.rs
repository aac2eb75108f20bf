//! CSV upload, listing, download, and delete.
//!
//! Uploads are gated on entitlement. The object is stored first and the
//! metadata row inserted second; a failed insert removes the object again so
//! the store and the catalog cannot drift apart.

use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{delete, get, post},
};
use db::models::{
    file_record::{CreateFileRecord, FileRecord},
    project::Project,
};
use serde::Deserialize;
use services::services::storage::{StorageClient, StorageError};
use tracing::warn;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::require_access};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub profile_id: String,
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<FileRecord>>, ApiError> {
    let project = Project::find_by_id(&state.db().pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    if project.profile_id != query.profile_id {
        return Err(ApiError::NotFound("project"));
    }

    require_access(&state, &query.profile_id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(|name| name.to_string())
                .ok_or_else(|| ApiError::BadRequest("file name is required".to_string()))?;
            let mime_type = field.content_type().map(|mime| mime.to_string());
            let bytes = field.bytes().await?;
            upload = Some((file_name, mime_type, bytes));
            break;
        }
    }
    let (file_name, mime_type, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;

    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(ApiError::BadRequest(
            "only .csv files are accepted".to_string(),
        ));
    }

    let storage_path = StorageClient::object_path(&query.profile_id, project_id, &file_name)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .storage()
        .upload(&storage_path, bytes.to_vec(), mime_type.as_deref())
        .await?;

    let data = CreateFileRecord {
        project_id,
        profile_id: query.profile_id,
        file_name,
        storage_path: storage_path.clone(),
        mime_type,
        size_bytes: bytes.len() as i64,
    };

    match FileRecord::create(&state.db().pool, &data, Uuid::new_v4()).await {
        Ok(record) => Ok(ResponseJson(ApiResponse::success(record))),
        Err(e) => {
            // Roll the object back so the catalog stays authoritative.
            if let Err(remove_err) = state.storage().remove(&storage_path).await {
                warn!(
                    storage_path = %storage_path,
                    error = %remove_err,
                    "failed to remove object after metadata insert failure"
                );
            }
            Err(e.into())
        }
    }
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<FileRecord>>>, ApiError> {
    let files = FileRecord::find_by_project_id(&state.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(files)))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = FileRecord::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("file"))?;

    let bytes = state.storage().download(&record.storage_path).await?;

    let content_type = record
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!("attachment; filename=\"{}\"", record.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Remove the stored object first, then the metadata row. A missing object
/// still lets the row go away.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let record = FileRecord::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("file"))?;

    match state.storage().remove(&record.storage_path).await {
        Ok(()) | Err(StorageError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    FileRecord::delete(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/files",
            post(upload_file).get(list_files),
        )
        .route("/files/{id}/download", get(download_file))
        .route("/files/{id}", delete(delete_file))
}
