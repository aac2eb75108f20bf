use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Metadata row for an uploaded CSV file. The bytes themselves live in the
/// external object store under `storage_path`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct FileRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub profile_id: String,
    pub file_name: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFileRecord {
    pub project_id: Uuid,
    pub profile_id: String,
    pub file_name: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

impl FileRecord {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            r#"SELECT id, project_id, profile_id, file_name, storage_path, mime_type, size_bytes, created_at
               FROM files
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            r#"SELECT id, project_id, profile_id, file_name, storage_path, mime_type, size_bytes, created_at
               FROM files
               WHERE project_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateFileRecord,
        file_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            r#"INSERT INTO files (id, project_id, profile_id, file_name, storage_path, mime_type, size_bytes)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, project_id, profile_id, file_name, storage_path, mime_type, size_bytes, created_at"#,
        )
        .bind(file_id)
        .bind(data.project_id)
        .bind(&data.profile_id)
        .bind(&data.file_name)
        .bind(&data.storage_path)
        .bind(&data.mime_type)
        .bind(data.size_bytes)
        .fetch_one(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
