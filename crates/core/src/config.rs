use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingOptions {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalOptions {
    pub top_k: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub answer_max_tokens: usize,
    pub map_max_tokens: usize,
    pub reduce_max_tokens: usize,
    pub max_history_turns: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            answer_max_tokens: 512,
            map_max_tokens: 150,
            reduce_max_tokens: 3_000,
            max_history_turns: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummarizationOptions {
    pub clusters: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
}

impl Default for SummarizationOptions {
    fn default() -> Self {
        Self {
            clusters: 10,
            seed: 42,
            n_init: 10,
            max_iterations: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryOptions {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunking: ChunkingOptions,
    pub retrieval: RetrievalOptions,
    pub generation: GenerationOptions,
    pub summarization: SummarizationOptions,
    pub retry: RetryOptions,
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&raw).map_err(|error| {
            IngestError::InvalidConfig(format!("{}: {error}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunking.size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunking.overlap >= self.chunking.size {
            return Err(IngestError::InvalidConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunking.overlap, self.chunking.size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(IngestError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(IngestError::InvalidConfig(format!(
                "temperature {} outside 0.0..=2.0",
                self.generation.temperature
            )));
        }
        if self.summarization.clusters == 0 || self.summarization.n_init == 0 {
            return Err(IngestError::InvalidConfig(
                "clusters and n_init must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let mut config = PipelineConfig::default();
        config.chunking.overlap = config.chunking.size;
        assert!(matches!(
            config.validate(),
            Err(IngestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("docrag.json");
        std::fs::write(&path, r#"{ "chunking": { "size": 200 }, "retrieval": { "top_k": 5 } }"#)?;

        let config = PipelineConfig::from_json_file(&path)?;
        assert_eq!(config.chunking.size, 200);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.generation.answer_max_tokens, 512);
        Ok(())
    }

    #[test]
    fn out_of_range_temperature_fails_on_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("docrag.json");
        std::fs::write(&path, r#"{ "generation": { "temperature": 3.5 } }"#)?;

        assert!(PipelineConfig::from_json_file(&path).is_err());
        Ok(())
    }
}
