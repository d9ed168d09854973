use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
const HTTP_BATCH_SIZE: usize = 32;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ModelError::Inference("embedder returned no vector".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub async fn connect(base_url: &Url, model: impl Into<String>) -> Result<Self, ModelError> {
        let model = model.into();
        let endpoint = base_url
            .join("v1/embeddings")
            .map_err(|error| ModelError::ModelUnavailable(format!("bad embedding url: {error}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|error| ModelError::ModelUnavailable(error.to_string()))?;

        let mut embedder = Self {
            client,
            endpoint,
            model,
            dimensions: 0,
        };

        let probe = embedder
            .request(&["dimension probe".to_string()])
            .await
            .map_err(|error| {
                ModelError::ModelUnavailable(format!(
                    "embedding model {} at {} did not respond: {error}",
                    embedder.model, embedder.endpoint
                ))
            })?;
        embedder.dimensions = probe.first().map(Vec::len).unwrap_or_default();
        if embedder.dimensions == 0 {
            return Err(ModelError::ModelUnavailable(format!(
                "embedding model {} returned an empty vector",
                embedder.model
            )));
        }

        info!(model = %embedder.model, dimensions = embedder.dimensions, "embedding model ready");
        Ok(embedder)
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
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
                "embedding runtime returned {status}: {body}"
            )));
        }

        let payload: EmbeddingResponse = response.json().await?;
        rows_to_vectors(payload, inputs.len())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(HTTP_BATCH_SIZE) {
            debug!(batch = batch.len(), "embedding batch");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }
}

fn rows_to_vectors(payload: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>, ModelError> {
    if payload.data.len() != expected {
        return Err(ModelError::Inference(format!(
            "embedding runtime returned {} vectors for {} inputs",
            payload.data.len(),
            expected
        )));
    }

    let mut rows = payload.data;
    if rows.iter().all(|row| row.index.is_some()) {
        rows.sort_by_key(|row| row.index.unwrap_or_default());
    }

    Ok(rows.into_iter().map(|row| row.embedding).collect())
}
