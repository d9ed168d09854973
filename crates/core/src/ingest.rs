use crate::chunking::Chunker;
use crate::embeddings::Embedder;
use crate::error::{IngestError, PipelineError};
use crate::extractor::TextExtractor;
use crate::models::{Chunk, Corpus, DocumentFingerprint, DocumentKind, IngestionReport};
use crate::worker::CancellationFlag;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const EMBED_BATCH: usize = 64;

pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(input).into_iter().filter_map(|item| item.ok()) {
            if entry.file_type().is_file() && DocumentKind::from_path(entry.path()).is_supported() {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort_unstable();
        files.extend(found);
    }

    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub async fn ingest_files(
    paths: &[PathBuf],
    extractor: &TextExtractor,
    chunker: &Chunker,
    embedder: &dyn Embedder,
    cancel: &CancellationFlag,
) -> Result<(Corpus, IngestionReport), PipelineError> {
    let mut corpus = Corpus::default();
    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in paths {
        cancel.check()?;

        let Some(text) = extractor.extract(path).await? else {
            warn!(path = %path.display(), "skipping unsupported file");
            skipped_files.push(path.clone());
            continue;
        };
        if text.trim().is_empty() {
            warn!(path = %path.display(), "no extractable text, skipping document");
            continue;
        }

        let windows = chunker.split(&text);
        let first_id = corpus.chunks.len();
        debug!(path = %path.display(), chunks = windows.len(), "chunked document");

        for batch in windows.chunks(EMBED_BATCH) {
            cancel.check()?;
            let texts: Vec<String> = batch.iter().map(|(_, window)| window.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(crate::error::ModelError::Inference(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    texts.len()
                ))
                .into());
            }

            for ((offset, window), vector) in batch.iter().zip(vectors) {
                corpus.chunks.push(Chunk {
                    id: corpus.chunks.len(),
                    source_path: path.clone(),
                    offset: *offset,
                    text: window.clone(),
                });
                corpus.vectors.push(vector);
            }
        }

        documents.push(DocumentFingerprint {
            source_path: path.clone(),
            kind: DocumentKind::from_path(path),
            checksum: digest_file(path)?,
            char_count: text.chars().count(),
            chunk_count: corpus.chunks.len() - first_id,
        });
    }

    if corpus.is_empty() {
        return Err(IngestError::NoExtractableText.into());
    }

    info!(
        documents = documents.len(),
        skipped = skipped_files.len(),
        chunks = corpus.len(),
        "ingested documents"
    );

    let report = IngestionReport {
        chunk_count: corpus.len(),
        dimensions: embedder.dimensions(),
        documents,
        skipped_files,
    };
    Ok((corpus, report))
}
