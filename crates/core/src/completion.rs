use crate::config::RetryOptions;
use crate::error::ModelError;
use crate::traits::{CompletionClient, CompletionRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_MODEL_PATH: &str = "models/Dolphin3.0-Llama3.2-3B-Q5_K_M.gguf";

pub const LEAKAGE_TOKEN: &str = "[/INST]";

pub fn strip_leakage(text: &str) -> String {
    text.replace(LEAKAGE_TOKEN, "")
}

#[derive(Debug, Serialize)]
struct LlamaCompletionRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    n_predict: usize,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct LlamaCompletionResponse {
    content: String,
}

#[derive(Debug, Clone)]
pub struct LlamaServerClient {
    client: Client,
    completion_url: Url,
}

impl LlamaServerClient {
    pub async fn connect(base_url: &Url, model_path: &Path) -> Result<Self, ModelError> {
        if !model_path.is_file() {
            return Err(ModelError::ModelUnavailable(format!(
                "model file not found at {}",
                model_path.display()
            )));
        }

        let unavailable =
            |error: url::ParseError| ModelError::ModelUnavailable(format!("bad runtime url: {error}"));
        let health_url = base_url.join("health").map_err(unavailable)?;
        let completion_url = base_url.join("completion").map_err(unavailable)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|error| ModelError::ModelUnavailable(error.to_string()))?;

        let response = client.get(health_url.clone()).send().await.map_err(|error| {
            ModelError::ModelUnavailable(format!("runtime at {health_url} unreachable: {error}"))
        })?;
        if !response.status().is_success() {
            return Err(ModelError::ModelUnavailable(format!(
                "runtime at {health_url} reported {}",
                response.status()
            )));
        }

        info!(model = %model_path.display(), runtime = %base_url, "language model ready");
        Ok(Self {
            client,
            completion_url,
        })
    }
}

#[async_trait]
impl CompletionClient for LlamaServerClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError> {
        let response = self
            .client
            .post(self.completion_url.clone())
            .json(&LlamaCompletionRequest {
                prompt: request.prompt,
                temperature: request.temperature,
                n_predict: request.max_tokens,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ModelError::Inference(format!(
                "runtime returned {status}: {body}"
            )));
        }

        let payload: LlamaCompletionResponse = response.json().await?;
        Ok(strip_leakage(&payload.content))
    }
}

pub struct RetryingClient<C> {
    inner: C,
    policy: RetryOptions,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryOptions) -> Self {
        Self { inner, policy }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u64 << attempt.min(16);
        let delay = self.policy.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.policy.max_delay_ms))
    }
}

#[async_trait]
impl<C> CompletionClient for RetryingClient<C>
where
    C: CompletionClient,
{
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
