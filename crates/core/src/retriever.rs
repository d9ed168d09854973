use crate::chunking::Chunker;
use crate::embeddings::Embedder;
use crate::error::{PipelineError, SearchError};
use crate::extractor::TextExtractor;
use crate::index::FlatL2Index;
use crate::ingest::ingest_files;
use crate::models::{Corpus, IngestionReport, SearchHit};
use crate::traits::VectorIndex;
use crate::worker::CancellationFlag;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct Retriever<I = FlatL2Index> {
    extractor: TextExtractor,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: I,
}

impl Retriever<FlatL2Index> {
    pub fn new(extractor: TextExtractor, chunker: Chunker, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_index(extractor, chunker, embedder, FlatL2Index::new())
    }
}

impl<I> Retriever<I>
where
    I: VectorIndex,
{
    pub fn with_index(
        extractor: TextExtractor,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        index: I,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            index,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationFlag,
    ) -> Result<(Corpus, IngestionReport), PipelineError> {
        ingest_files(
            paths,
            &self.extractor,
            &self.chunker,
            self.embedder.as_ref(),
            cancel,
        )
        .await
    }

    /// Rebuilds the index from scratch over `paths`. The previous index is
    /// dropped first, so a failed run leaves nothing to query.
    pub async fn process_files(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancellationFlag,
    ) -> Result<IngestionReport, PipelineError> {
        self.index.reset();
        let (corpus, report) = self.ingest(paths, cancel).await?;
        self.index.build(corpus.vectors, corpus.chunks)?;
        info!(chunks = self.index.len(), "index rebuilt");
        Ok(report)
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>, PipelineError> {
        if !self.index.is_ready() {
            return Err(SearchError::IndexNotReady.into());
        }
        let query_vector = self.embedder.embed(question).await?;
        Ok(self.index.search(&query_vector, top_k)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::LopdfExtractor;
    use tempfile::tempdir;

    fn retriever() -> Retriever {
        Retriever::new(
            TextExtractor::new(Arc::new(LopdfExtractor), None),
            Chunker::default(),
            Arc::new(CharacterNgramEmbedder::default()),
        )
    }

    #[tokio::test]
    async fn retrieve_before_processing_is_not_ready() {
        let result = retriever().retrieve("anything", 3).await;
        assert!(matches!(
            result,
            Err(PipelineError::Search(SearchError::IndexNotReady))
        ));
    }

    #[tokio::test]
    async fn nearest_chunk_answers_capital_question() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paris = dir.path().join("paris.txt");
        let lyon = dir.path().join("lyon.txt");
        std::fs::write(&paris, "Paris is the capital of France.")?;
        std::fs::write(&lyon, "Lyon is a city in France.")?;

        let mut retriever = retriever();
        retriever
            .process_files(&[paris, lyon], &CancellationFlag::default())
            .await?;

        let hits = retriever.retrieve("What is the capital of France?", 1).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Paris is the capital of France.");

        let all = retriever.retrieve("What is the capital of France?", 10).await?;
        assert_eq!(all.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_rebuild_leaves_no_stale_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let doc = dir.path().join("doc.txt");
        let empty = dir.path().join("empty.txt");
        std::fs::write(&doc, "Some content worth indexing.")?;
        std::fs::write(&empty, "")?;

        let mut retriever = retriever();
        retriever
            .process_files(&[doc], &CancellationFlag::default())
            .await?;
        assert!(retriever.retrieve("content", 1).await.is_ok());

        assert!(retriever
            .process_files(&[empty], &CancellationFlag::default())
            .await
            .is_err());
        assert!(matches!(
            retriever.retrieve("content", 1).await,
            Err(PipelineError::Search(SearchError::IndexNotReady))
        ));
        Ok(())
    }
}
