use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::profile::EntitlementState;
use services::services::{
    ai_query::AiQueryError, provisioning::ProvisioningError, storage::StorageError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    AiQuery(#[from] AiQueryError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("subscription required")]
    FeatureGated(EntitlementState),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::FeatureGated(state) => {
                let message = gate_message(&state);
                (
                    StatusCode::PAYMENT_REQUIRED,
                    Json(ApiResponse::error_with_data(state, message)),
                )
                    .into_response()
            }
            Self::NotFound(what) => error_response(
                StatusCode::NOT_FOUND,
                format!("{what} not found"),
            ),
            Self::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            Self::Storage(StorageError::NotFound(path)) => {
                error_response(StatusCode::NOT_FOUND, format!("object not found: {path}"))
            }
            Self::Storage(e) => {
                error!(error = %e, "storage request failed");
                error_response(StatusCode::BAD_GATEWAY, "file storage unavailable")
            }
            Self::AiQuery(e) => {
                error!(error = %e, "AI query failed");
                error_response(StatusCode::BAD_GATEWAY, "AI assistant unavailable")
            }
            Self::Provisioning(e) => {
                error!(error = %e, "profile provisioning failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to provision profile")
            }
            Self::Database(e) => {
                error!(error = %e, "database request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

/// Denial message for a gated feature: names the trial-ended date when one is
/// known and always carries the subscribe call to action.
fn gate_message(state: &EntitlementState) -> String {
    match state.trial_ends_at {
        Some(ends_at) => format!(
            "Your free trial ended on {}. Subscribe to continue.",
            ends_at.format("%Y-%m-%d")
        ),
        None => "Your free trial has ended. Subscribe to continue.".to_string(),
    }
}
