use crate::error::{ModelError, SearchError};
use crate::models::{Chunk, SearchHit};
use async_trait::async_trait;

pub trait VectorIndex: Send + Sync {
    fn build(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<(), SearchError>;

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, SearchError>;

    fn reset(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_ready(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError>;
}
