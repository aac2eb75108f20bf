//! Client for the external AI analysis endpoint.
//!
//! The endpoint accepts `{projectId, query}` and answers with a single
//! `{response}` string; everything behind it is the collaborator's concern.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::config::AiConfig;

#[derive(Debug, Clone, Error)]
pub enum AiQueryError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("json error: {0}")]
    Serde(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl AiQueryError {
    fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AiQueryRequest<'a> {
    project_id: Uuid,
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct AiQueryResponse {
    response: String,
}

#[derive(Debug, Clone)]
pub struct AiQueryClient {
    http: Client,
    endpoint: Url,
}

impl AiQueryClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(config: &AiConfig) -> Result<Self, AiQueryError> {
        let endpoint = Url::parse(&config.endpoint_url)
            .map_err(|e| AiQueryError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("data-combat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiQueryError::Transport(e.to_string()))?;

        Ok(Self { http, endpoint })
    }

    /// Ask the assistant about a project's uploaded data.
    pub async fn analyze(&self, project_id: Uuid, query: &str) -> Result<String, AiQueryError> {
        let request = AiQueryRequest { project_id, query };

        let response = (|| async { self.send_request(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(AiQueryError::should_retry)
            .notify(|e, dur| {
                warn!(
                    "AI query failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        Ok(response.response)
    }

    async fn send_request(
        &self,
        request: &AiQueryRequest<'_>,
    ) -> Result<AiQueryResponse, AiQueryError> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<AiQueryResponse>()
                .await
                .map_err(|e| AiQueryError::Serde(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(AiQueryError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(AiQueryError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AiQueryError {
    if e.is_timeout() {
        AiQueryError::Timeout
    } else {
        AiQueryError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_wire_names() {
        let request = AiQueryRequest {
            project_id: Uuid::nil(),
            query: "what changed last week?",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["projectId"],
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(json["query"], "what changed last week?");
    }

    #[test]
    fn response_parses_single_field() {
        let parsed: AiQueryResponse =
            serde_json::from_str(r#"{"response": "Hello! No files uploaded yet."}"#).unwrap();
        assert_eq!(parsed.response, "Hello! No files uploaded yet.");
    }
}
