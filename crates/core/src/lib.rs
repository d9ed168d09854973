pub mod chunking;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod summarize;
#[cfg(test)]
mod test_support;
pub mod traits;
pub mod worker;

pub use chunking::Chunker;
pub use cluster::{kmeans, select_representatives, KMeansFit};
pub use completion::{
    strip_leakage, LlamaServerClient, RetryingClient, DEFAULT_MODEL_PATH, LEAKAGE_TOKEN,
};
pub use config::{
    ChunkingOptions, GenerationOptions, PipelineConfig, RetrievalOptions, RetryOptions,
    SummarizationOptions,
};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL,
};
pub use error::{error_report, IngestError, ModelError, PipelineError, SearchError};
pub use extractor::{
    LopdfExtractor, OcrEndpointConfig, PageText, PdfExtractor, TextExtractor,
};
pub use history::{ConversationHistory, Turn};
pub use index::FlatL2Index;
pub use ingest::{digest_file, expand_inputs, ingest_files};
pub use models::{
    Chunk, Corpus, DocumentFingerprint, DocumentKind, IngestionReport, SearchHit,
};
pub use orchestrator::{Answer, RagPipeline, Summary};
pub use prompt::{
    build_answer_prompt, build_map_prompt, build_reduce_prompt, load_metrics, AnswerPrompt,
};
pub use retriever::Retriever;
pub use summarize::{collate_summaries, map_reduce, summarize_chunks};
pub use traits::{CompletionClient, CompletionRequest, VectorIndex};
pub use worker::{
    CancellationFlag, FailureReport, Job, JobEvent, JobHandle, JobOutcome, JobPayload,
    PipelineWorker,
};
