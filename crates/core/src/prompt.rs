use crate::error::IngestError;
use crate::history::Turn;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

pub const TURN_START: &str = "<|im_start|>";
pub const TURN_END: &str = "<|im_end|>";

pub const CONTEXT_SEPARATOR: &str = "\n\n";

const INSUFFICIENT_CONTEXT: &str = "Insufficient context";

const ANSWER_SYSTEM: &str = "You are a helpful assistant answering questions about the user's documents. \
If the answer is not present in the context, reply with \"Insufficient context\" and nothing else. \
Structure your response in markdown, using bullet points or headings where they help.";

const EVALUATION_SYSTEM: &str = "You are a helpful assistant in a document Q&A setting whose task is to write evaluation feedback. \
The metrics describe the evaluation that was conducted; use the context to enrich answers drawn from the metrics. \
If the answer is present in neither, reply with \"Insufficient context\" and nothing else. \
Structure your response in markdown, using bullet points or headings where they help.";

const MAP_INSTRUCTION: &str = "Act as a concise summariser.\n\
Summarise the text enclosed in triple backticks in 2-3 sentences, no more, covering all of its content.\n\
Reply with the summary only.";

const REDUCE_SYSTEM: &str = "You are a precise summariser.\n\
You will be given a series of partial summaries of one document, enclosed in triple backticks.\n\
Write a detailed, coherent summary that captures all key information in them, combined into one whole \
so a reader understands the entire document from it. Do not add outside information. \
Capture the tone of the document. Structure your response in markdown.";

#[derive(Debug, Clone, Copy)]
pub struct AnswerPrompt<'a> {
    pub question: &'a str,
    pub context: &'a [String],
    pub history: &'a [Turn],
    pub metrics: Option<&'a Value>,
}

fn push_segment(prompt: &mut String, role: &str, body: &str) {
    let _ = writeln!(prompt, "{TURN_START}{role}\n{body}{TURN_END}");
}

pub fn render_history(turns: &[Turn]) -> String {
    let mut rendered = String::new();
    for turn in turns {
        let _ = write!(rendered, "Q: {}\nA: {}\n\n", turn.question, turn.answer);
    }
    rendered
}

pub fn render_metrics(metrics: &Value) -> String {
    serde_json::to_string_pretty(metrics).unwrap_or_else(|_| metrics.to_string())
}

pub fn build_answer_prompt(input: &AnswerPrompt<'_>) -> String {
    let context = input.context.join(CONTEXT_SEPARATOR);
    let mut prompt = String::new();

    let system = if input.metrics.is_some() {
        EVALUATION_SYSTEM
    } else {
        ANSWER_SYSTEM
    };
    push_segment(&mut prompt, "system", system);

    if !input.history.is_empty() {
        prompt.push_str(&render_history(input.history));
    }

    let mut user = String::new();
    match input.metrics {
        Some(metrics) => {
            let _ = write!(
                user,
                "Use the following metrics to answer the question, enhancing the answer with the given context. \
Print only the answer, in markdown, and nothing irrelevant to the question. \
If the context holds the information, do not mention {INSUFFICIENT_CONTEXT:?}.\n\n\
Metrics:\n{}\n\n",
                render_metrics(metrics)
            );
        }
        None => user.push_str("Use the following context to answer the question.\n\n"),
    }
    let _ = write!(user, "Context:\n{context}\n\nQuestion:\n{}", input.question);
    push_segment(&mut prompt, "user", &user);

    let _ = writeln!(prompt, "{TURN_START}assistant");
    prompt
}

pub fn build_map_prompt(chunk_text: &str) -> String {
    format!("{MAP_INSTRUCTION}\n\n```{chunk_text}```\nSUMMARY:\n")
}

pub fn build_reduce_prompt(partial_summaries: &[String]) -> String {
    let joined = partial_summaries.join("\n");
    let mut prompt = String::new();
    push_segment(&mut prompt, "system", REDUCE_SYSTEM);
    push_segment(
        &mut prompt,
        "user",
        &format!(
            "```{joined}```\nQuestion:\nProvide a detailed summary of the document based on the provided summaries."
        ),
    );
    let _ = writeln!(prompt, "{TURN_START}assistant\nSUMMARY:");
    prompt
}

pub fn load_metrics(path: &Path) -> Result<Value, IngestError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|error| IngestError::ExtractionFailed {
        path: path.to_path_buf(),
        reason: format!("metrics are not valid json: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversationHistory;
    use serde_json::json;

    #[test]
    fn answer_prompt_has_roles_in_order() {
        let context = vec!["Paris is the capital of France.".to_string()];
        let prompt = build_answer_prompt(&AnswerPrompt {
            question: "What is the capital of France?",
            context: &context,
            history: &[],
            metrics: None,
        });

        let system = prompt.find("<|im_start|>system\n").unwrap();
        let user = prompt.find("<|im_start|>user\n").unwrap();
        let assistant = prompt.find("<|im_start|>assistant\n").unwrap();
        assert!(system < user && user < assistant);
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
        assert!(prompt.contains("Context:\nParis is the capital of France.\n\nQuestion:\nWhat is the capital of France?<|im_end|>"));
        assert!(!prompt.contains("Metrics:"));
    }

    #[test]
    fn context_is_joined_with_blank_lines_nearest_first() {
        let context = vec!["first".to_string(), "second".to_string()];
        let prompt = build_answer_prompt(&AnswerPrompt {
            question: "q",
            context: &context,
            history: &[],
            metrics: None,
        });
        assert!(prompt.contains("Context:\nfirst\n\nsecond\n\nQuestion:"));
    }

    #[test]
    fn history_is_rendered_oldest_first_before_user_turn() {
        let mut history = ConversationHistory::new();
        history.push("one?", "1");
        history.push("two?", "2");

        let prompt = build_answer_prompt(&AnswerPrompt {
            question: "three?",
            context: &[],
            history: history.turns(),
            metrics: None,
        });

        let first = prompt.find("Q: one?\nA: 1\n").unwrap();
        let second = prompt.find("Q: two?\nA: 2\n").unwrap();
        let user = prompt.find("<|im_start|>user").unwrap();
        assert!(first < second && second < user);
    }

    #[test]
    fn metrics_switch_to_evaluation_template() {
        let metrics = json!({ "accuracy": 0.91 });
        let prompt = build_answer_prompt(&AnswerPrompt {
            question: "How did the model do?",
            context: &[],
            history: &[],
            metrics: Some(&metrics),
        });
        assert!(prompt.contains("evaluation feedback"));
        assert!(prompt.contains("Metrics:\n{\n  \"accuracy\": 0.91\n}"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let context = vec!["a".to_string()];
        let input = AnswerPrompt {
            question: "q",
            context: &context,
            history: &[],
            metrics: None,
        };
        assert_eq!(build_answer_prompt(&input), build_answer_prompt(&input));
    }

    #[test]
    fn reduce_prompt_joins_summaries_with_newlines() {
        let prompt = build_reduce_prompt(&["alpha".to_string(), "beta".to_string()]);
        assert!(prompt.contains("```alpha\nbeta```"));
        assert!(prompt.ends_with("<|im_start|>assistant\nSUMMARY:\n"));
    }

    #[test]
    fn map_prompt_wraps_chunk_in_backticks() {
        let prompt = build_map_prompt("chapter one");
        assert!(prompt.contains("```chapter one```"));
        assert!(prompt.contains("2-3 sentences"));
    }
}
