use crate::chunking::Chunker;
use crate::cluster::select_representatives;
use crate::config::{PipelineConfig, SummarizationOptions};
use crate::embeddings::Embedder;
use crate::error::{PipelineError, SearchError};
use crate::extractor::TextExtractor;
use crate::history::ConversationHistory;
use crate::index::FlatL2Index;
use crate::models::{IngestionReport, SearchHit};
use crate::prompt::{build_answer_prompt, AnswerPrompt};
use crate::retriever::Retriever;
use crate::summarize::{collate_summaries, summarize_chunks};
use crate::traits::{CompletionClient, CompletionRequest, VectorIndex};
use crate::worker::CancellationFlag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub representative_ids: Vec<usize>,
    pub partial_summaries: Vec<String>,
    pub chunk_count: usize,
}

pub struct RagPipeline<I = FlatL2Index> {
    config: PipelineConfig,
    retriever: Retriever<I>,
    client: Arc<dyn CompletionClient>,
}

impl RagPipeline<FlatL2Index> {
    pub fn new(
        config: PipelineConfig,
        extractor: TextExtractor,
        embedder: Arc<dyn Embedder>,
        client: Arc<dyn CompletionClient>,
    ) -> Result<Self, PipelineError> {
        Self::with_index(config, extractor, embedder, client, FlatL2Index::new())
    }
}

impl<I> RagPipeline<I>
where
    I: VectorIndex,
{
    pub fn with_index(
        config: PipelineConfig,
        extractor: TextExtractor,
        embedder: Arc<dyn Embedder>,
        client: Arc<dyn CompletionClient>,
        index: I,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let chunker = Chunker::try_from(config.chunking)?;
        Ok(Self {
            retriever: Retriever::with_index(extractor, chunker, embedder, index),
            config,
            client,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever<I> {
        &self.retriever
    }

    pub async fn process(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancellationFlag,
    ) -> Result<IngestionReport, PipelineError> {
        self.retriever.process_files(paths, cancel).await
    }

    /// Answers from the current index. The turn is appended to `history`
    /// only when generation succeeds.
    pub async fn ask(
        &self,
        question: &str,
        history: &mut ConversationHistory,
        metrics: Option<&Value>,
    ) -> Result<Answer, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("question is empty".to_string()));
        }
        if !self.retriever.index().is_ready() {
            return Err(SearchError::IndexNotReady.into());
        }

        let sources = self
            .retriever
            .retrieve(question, self.config.retrieval.top_k)
            .await?;
        let context: Vec<String> = sources.iter().map(|hit| hit.text.clone()).collect();

        let generation = &self.config.generation;
        let prompt = build_answer_prompt(&AnswerPrompt {
            question,
            context: &context,
            history: history.recent(generation.max_history_turns),
            metrics,
        });

        let text = self
            .client
            .complete(&CompletionRequest {
                prompt: &prompt,
                temperature: generation.temperature,
                max_tokens: generation.answer_max_tokens,
            })
            .await?;

        history.push(question, text.clone());
        info!(turns = history.len(), sources = sources.len(), "answered question");
        Ok(Answer { text, sources })
    }

    pub async fn summarize(
        &self,
        paths: &[PathBuf],
        clusters: Option<usize>,
        cancel: &CancellationFlag,
    ) -> Result<Summary, PipelineError> {
        let options = SummarizationOptions {
            clusters: clusters.unwrap_or(self.config.summarization.clusters),
            ..self.config.summarization
        };
        if options.clusters == 0 {
            return Err(PipelineError::InvalidArgument(
                "cluster count must be at least 1".to_string(),
            ));
        }

        let (corpus, _report) = self.retriever.ingest(paths, cancel).await?;
        cancel.check()?;

        let representative_ids = select_representatives(&corpus.vectors, &options);
        info!(
            chunks = corpus.len(),
            representatives = representative_ids.len(),
            "selected representative chunks"
        );

        let generation = &self.config.generation;
        let partial_summaries = summarize_chunks(
            self.client.as_ref(),
            &corpus.chunks,
            &representative_ids,
            generation,
            cancel,
        )
        .await?;
        cancel.check()?;
        let text = collate_summaries(self.client.as_ref(), &partial_summaries, generation).await?;

        Ok(Summary {
            text,
            representative_ids,
            partial_summaries,
            chunk_count: corpus.len(),
        })
    }
}
