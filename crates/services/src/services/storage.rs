//! Object storage client for uploaded project files.
//!
//! The store is an external collaborator addressed by
//! `{identity_id}/{project_id}/{file_name}` paths inside a bucket; this
//! client is a thin pass-through over its REST surface.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::config::StorageConfig;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0}")]
    InvalidFileName(String),
    #[error("invalid storage url: {0}")]
    InvalidUrl(String),
}

impl StorageError {
    fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    service_key: SecretString,
    bucket: String,
}

impl StorageClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("data-combat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Compose the object path for an uploaded file.
    ///
    /// The file name must be a single path segment; anything that could
    /// escape the `{identity}/{project}` prefix is rejected.
    pub fn object_path(
        identity_id: &str,
        project_id: Uuid,
        file_name: &str,
    ) -> Result<String, StorageError> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\'])
        {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }
        Ok(format!("{identity_id}/{project_id}/{file_name}"))
    }

    /// Store an object. The store rejects writes to an existing path
    /// (`x-upsert: false`); uploads are single-attempt.
    pub async fn upload(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let url = self.object_url(path)?;

        let mut request = self
            .http
            .post(url)
            .bearer_auth(self.service_key.expose_secret())
            .header("x-upsert", "false")
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type.to_string());
        }

        let res = request.send().await.map_err(map_reqwest_error)?;
        match res.status() {
            s if s.is_success() => Ok(()),
            s => Err(self.http_error(s, res).await),
        }
    }

    pub async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        let url = self.object_url(path)?;

        (|| async {
            let res = self
                .http
                .get(url.clone())
                .bearer_auth(self.service_key.expose_secret())
                .send()
                .await
                .map_err(map_reqwest_error)?;

            match res.status() {
                s if s.is_success() => res
                    .bytes()
                    .await
                    .map_err(|e| StorageError::Transport(e.to_string())),
                StatusCode::NOT_FOUND => Err(StorageError::NotFound(path.to_string())),
                s => Err(self.http_error(s, res).await),
            }
        })
        .retry(&Self::retry_policy())
        .when(StorageError::should_retry)
        .notify(|e, dur| {
            warn!(
                "storage download failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }

    /// Delete an object. Removing an already-absent object succeeds.
    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let url = self.object_url(path)?;

        (|| async {
            let res = self
                .http
                .delete(url.clone())
                .bearer_auth(self.service_key.expose_secret())
                .send()
                .await
                .map_err(map_reqwest_error)?;

            match res.status() {
                s if s.is_success() => Ok(()),
                StatusCode::NOT_FOUND => Ok(()),
                s => Err(self.http_error(s, res).await),
            }
        })
        .retry(&Self::retry_policy())
        .when(StorageError::should_retry)
        .notify(|e, dur| {
            warn!(
                "storage delete failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }

    fn retry_policy() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(3)
            .with_jitter()
    }

    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(&format!("object/{}/{}", self.bucket, path))
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))
    }

    async fn http_error(&self, status: StatusCode, res: reqwest::Response) -> StorageError {
        let body = res.text().await.unwrap_or_default();
        StorageError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout
    } else {
        StorageError::Transport(e.to_string())
    }
}
