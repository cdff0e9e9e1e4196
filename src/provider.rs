use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::model::{ProviderReply, ResponsesRequest, Upload};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider reply is not valid JSON: {0}")]
    InvalidReply(#[from] serde_json::Error),
}

/// A reply that made it back from the provider, successful or not.
#[derive(Debug)]
pub struct ProviderOutcome {
    pub status: StatusCode,
    pub reply: ProviderReply,
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn analyze(&self, api_key: &str, upload: &Upload)
        -> Result<ProviderOutcome, ProviderError>;
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        OpenAiClient {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl InferenceProvider for OpenAiClient {
    async fn analyze(
        &self,
        api_key: &str,
        upload: &Upload,
    ) -> Result<ProviderOutcome, ProviderError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            mime_type = %upload.mime_type,
            bytes = upload.bytes.len(),
            "Sending image to provider"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&ResponsesRequest::for_upload(upload))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let reply = ProviderReply::from_body(&body)?;

        tracing::debug!(%status, "Provider replied");

        Ok(ProviderOutcome { status, reply })
    }
}
