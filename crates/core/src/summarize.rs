use crate::config::GenerationOptions;
use crate::error::PipelineError;
use crate::models::Chunk;
use crate::prompt::{build_map_prompt, build_reduce_prompt};
use crate::traits::{CompletionClient, CompletionRequest};
use crate::worker::CancellationFlag;
use tracing::{debug, info};

pub async fn summarize_chunks(
    client: &dyn CompletionClient,
    chunks: &[Chunk],
    selected: &[usize],
    options: &GenerationOptions,
    cancel: &CancellationFlag,
) -> Result<Vec<String>, PipelineError> {
    let mut ordered = selected.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let mut summaries = Vec::with_capacity(ordered.len());
    for id in ordered {
        cancel.check()?;
        let chunk = chunks.get(id).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("no chunk with id {id}"))
        })?;

        let prompt = build_map_prompt(&chunk.text);
        let summary = client
            .complete(&CompletionRequest {
                prompt: &prompt,
                temperature: options.temperature,
                max_tokens: options.map_max_tokens,
            })
            .await?;
        debug!(chunk_id = id, "chunk summary ready");
        summaries.push(summary);
    }

    Ok(summaries)
}

pub async fn collate_summaries(
    client: &dyn CompletionClient,
    partial_summaries: &[String],
    options: &GenerationOptions,
) -> Result<String, PipelineError> {
    let prompt = build_reduce_prompt(partial_summaries);
    let summary = client
        .complete(&CompletionRequest {
            prompt: &prompt,
            temperature: options.temperature,
            max_tokens: options.reduce_max_tokens,
        })
        .await?;
    info!(partials = partial_summaries.len(), "collated summary");
    Ok(summary)
}

pub async fn map_reduce(
    client: &dyn CompletionClient,
    chunks: &[Chunk],
    selected: &[usize],
    options: &GenerationOptions,
    cancel: &CancellationFlag,
) -> Result<String, PipelineError> {
    let partials = summarize_chunks(client, chunks, selected, options, cancel).await?;
    cancel.check()?;
    collate_summaries(client, &partials, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        prompts: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl CompletionClient for Recording {
        async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ModelError> {
            let mut prompts = self.prompts.lock().unwrap();
            let call = prompts.len();
            prompts.push(request.prompt.to_string());
            if self.fail_on == Some(call) {
                return Err(ModelError::Inference("out of memory".to_string()));
            }
            Ok(format!("summary {call}"))
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| Chunk {
                id,
                source_path: PathBuf::from("book.pdf"),
                offset: id * 450,
                text: text.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn one_map_call_per_chunk_then_one_reduce() {
        let client = Recording::default();
        let chunks = chunks(&["alpha", "beta", "gamma"]);

        let summary = map_reduce(
            &client,
            &chunks,
            &[2, 0],
            &GenerationOptions::default(),
            &CancellationFlag::default(),
        )
        .await
        .unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("```alpha```"));
        assert!(prompts[1].contains("```gamma```"));
        assert!(prompts[2].contains("```summary 0\nsummary 1```"));
        assert_eq!(summary, "summary 2");
    }

    #[tokio::test]
    async fn failed_map_call_fails_summary() {
        let client = Recording {
            fail_on: Some(1),
            ..Recording::default()
        };
        let chunks = chunks(&["alpha", "beta", "gamma"]);

        let result = map_reduce(
            &client,
            &chunks,
            &[0, 1, 2],
            &GenerationOptions::default(),
            &CancellationFlag::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(PipelineError::Model(ModelError::Inference(_)))
        ));
        assert_eq!(client.prompts.lock().unwrap().len(), 2);
    }
}
