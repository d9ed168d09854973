use crate::error::SearchError;
use crate::models::{Chunk, SearchHit};
use crate::traits::VectorIndex;
use std::cmp::Ordering;

#[derive(Debug, Default)]
pub struct FlatL2Index {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
    ready: bool,
}

impl FlatL2Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunk(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }
}

pub fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

impl VectorIndex for FlatL2Index {
    fn build(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<(), SearchError> {
        if vectors.len() != chunks.len() {
            return Err(SearchError::CountMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(SearchError::DimensionMismatch {
                expected: dimensions,
                found: bad.len(),
            });
        }

        self.dimensions = dimensions;
        self.vectors = vectors;
        self.chunks = chunks;
        self.ready = true;
        Ok(())
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if !self.ready {
            return Err(SearchError::IndexNotReady);
        }
        if !self.vectors.is_empty() && query_vector.len() != self.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions,
                found: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| (id, squared_l2(query_vector, vector)))
            .collect();

        scored.sort_by(|left, right| match left.1.total_cmp(&right.1) {
            Ordering::Equal => left.0.cmp(&right.0),
            other => other,
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(id, distance)| SearchHit {
                chunk_id: self.chunks[id].id,
                distance: distance.sqrt(),
                text: self.chunks[id].text.clone(),
            })
            .collect())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
