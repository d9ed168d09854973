use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("text extraction failed for {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no extractable text in the selected documents")]
    NoExtractableText,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("vector count {vectors} does not match chunk count {chunks}")]
    CountMismatch { vectors: usize, chunks: usize },

    #[error("index not ready: process documents before querying")]
    IndexNotReady,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Failures worth another attempt. A missing model or an undecodable
    /// reply fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Inference(_) => true,
            ModelError::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            ModelError::ModelUnavailable(_) | ModelError::Serialization(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pipeline run cancelled")]
    Cancelled,
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

pub fn error_report(error: &(dyn std::error::Error + 'static)) -> String {
    let mut report = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        report.push_str("\n  caused by: ");
        report.push_str(&cause.to_string());
        source = cause.source();
    }
    report
}
