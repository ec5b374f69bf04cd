use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::service::{ExecutionService, ServiceError};
use super::types::{ExecutionRequest, ExecutionToken, ExecutionVerdict};
use crate::config::JudgeConfig;

/// HTTP client for a Judge0 CE deployment, direct or behind RapidAPI.
pub struct Judge0Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    submissions: &'a [ExecutionRequest],
}

#[derive(Deserialize)]
struct TokenEntry {
    token: Option<ExecutionToken>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct BatchStatus {
    submissions: Vec<Option<ExecutionVerdict>>,
}

impl Judge0Client {
    pub fn new(config: &JudgeConfig) -> reqwest::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_host: config.api_host.clone(),
        })
    }

    fn batch_url(&self) -> String {
        format!("{}/submissions/batch", self.base_url)
    }

    fn with_credentials(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.header("x-rapidapi-key", key),
            None => request,
        };
        match &self.api_host {
            Some(host) => request.header("x-rapidapi-host", host),
            None => request,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ExecutionService for Judge0Client {
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<ExecutionToken>, ServiceError> {
        let response = self
            .with_credentials(self.http.post(self.batch_url()))
            .query(&[("base64_encoded", "false")])
            .json(&BatchBody {
                submissions: requests,
            })
            .send()
            .await?;

        let entries: Vec<TokenEntry> = ensure_success(response).await?.json().await?;

        entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                entry.token.ok_or_else(|| {
                    ServiceError::Rejected(format!(
                        "execution {i}: {}",
                        serde_json::Value::Object(entry.rest)
                    ))
                })
            })
            .collect()
    }

    async fn fetch_batch(
        &self,
        tokens: &[ExecutionToken],
    ) -> Result<Vec<ExecutionVerdict>, ServiceError> {
        let joined = tokens
            .iter()
            .map(ExecutionToken::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .with_credentials(self.http.get(self.batch_url()))
            .query(&[
                ("tokens", joined.as_str()),
                ("base64_encoded", "false"),
                ("fields", "*"),
            ])
            .send()
            .await?;

        let batch: BatchStatus = ensure_success(response).await?.json().await?;

        batch
            .submissions
            .into_iter()
            .enumerate()
            .map(|(i, verdict)| {
                verdict.ok_or_else(|| {
                    let token = tokens.get(i).map_or("?", ExecutionToken::as_str);
                    ServiceError::Rejected(format!("unknown token {token}"))
                })
            })
            .collect()
    }
}
