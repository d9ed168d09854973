use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docrag_core::{
    expand_inputs, load_metrics, CharacterNgramEmbedder, CompletionClient, ConversationHistory,
    Embedder, HttpEmbedder, Job, JobOutcome, JobPayload, LlamaServerClient, PipelineConfig,
    PipelineWorker, RagPipeline, RetryingClient, TextExtractor, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_MODEL_PATH,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "docrag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Quantized language model weights served by the local runtime
    #[arg(long, env = "DOCRAG_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Base URL of the llama.cpp-compatible completion runtime
    #[arg(long, env = "DOCRAG_LLM_URL", default_value = "http://127.0.0.1:8080/")]
    llm_url: Url,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Http)]
    embedder: EmbedderKind,

    /// Base URL of the OpenAI-compatible embedding runtime
    #[arg(long, env = "DOCRAG_EMBEDDING_URL", default_value = "http://127.0.0.1:8081/")]
    embedding_url: Url,

    /// Sentence-embedding model name
    #[arg(long, env = "DOCRAG_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// JSON pipeline configuration; unset fields keep their defaults
    #[arg(long, env = "DOCRAG_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Sentence-embedding model behind an HTTP runtime
    Http,
    /// Hashed character trigrams, no model required
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed and index documents, then print what was indexed.
    Ingest {
        /// PDF, JSON, text or markdown files, or folders containing them.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a single question from the documents.
    Ask {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// JSON evaluation metrics to ground the answer on.
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Print the retrieved context after the answer.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
    /// Interactive question answering with conversation history.
    Chat {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// JSON evaluation metrics to ground answers on.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Map-reduce summary of the documents.
    Summarize {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Number of clusters, which bounds the number of chunk summaries.
        #[arg(long)]
        clusters: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docrag boot"
    );

    let embedder: Arc<dyn Embedder> = match cli.embedder {
        EmbedderKind::Http => Arc::new(
            HttpEmbedder::connect(&cli.embedding_url, cli.embedding_model.clone())
                .await
                .context("embedding model could not be loaded")?,
        ),
        EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
    };

    let runtime = LlamaServerClient::connect(&cli.llm_url, &cli.model_path)
        .await
        .context("language model could not be loaded")?;
    let client: Arc<dyn CompletionClient> = Arc::new(RetryingClient::new(runtime, config.retry));

    let pipeline = RagPipeline::new(config, TextExtractor::default(), embedder, client)
        .context("invalid pipeline configuration")?;
    let worker = PipelineWorker::new(pipeline);

    match cli.command {
        Command::Ingest { paths } => {
            let report = match run(&worker, Job::Process { paths: expand_inputs(&paths) }).await? {
                JobPayload::Processed(report) => report,
                _ => bail!("unexpected job result"),
            };

            for skipped in &report.skipped_files {
                warn!(path = %skipped.display(), "skipped unsupported file");
            }
            for document in &report.documents {
                println!(
                    "{} chars={} chunks={} sha256={}",
                    document.source_path.display(),
                    document.char_count,
                    document.chunk_count,
                    document.checksum
                );
            }
            println!(
                "{} chunks indexed ({} dimensions) at {}",
                report.chunk_count,
                report.dimensions,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            paths,
            question,
            metrics,
            show_sources,
        } => {
            let metrics = read_metrics(metrics.as_ref())?;
            run(&worker, Job::Process { paths: expand_inputs(&paths) }).await?;

            let payload = run(
                &worker,
                Job::Ask {
                    question,
                    history: ConversationHistory::new(),
                    metrics,
                },
            )
            .await?;

            if let JobPayload::Answered { answer, .. } = payload {
                println!("{}", answer.text.trim());
                if show_sources {
                    for hit in answer.sources {
                        println!("\n[chunk {} distance={:.4}]\n{}", hit.chunk_id, hit.distance, hit.text);
                    }
                }
            }
        }
        Command::Chat { paths, metrics } => {
            let metrics = read_metrics(metrics.as_ref())?;
            let report = match run(&worker, Job::Process { paths: expand_inputs(&paths) }).await? {
                JobPayload::Processed(report) => report,
                _ => bail!("unexpected job result"),
            };
            println!(
                "{} chunks ready. Type a question, /reset to clear history, /quit to exit.",
                report.chunk_count
            );

            let mut history = ConversationHistory::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let question = line.trim();
                match question {
                    "" => continue,
                    "/quit" => break,
                    "/reset" => {
                        history.clear();
                        println!("history cleared");
                        continue;
                    }
                    _ => {}
                }

                let outcome = worker
                    .submit(Job::Ask {
                        question: question.to_string(),
                        history: history.clone(),
                        metrics: metrics.clone(),
                    })
                    .outcome()
                    .await;

                // A failed turn leaves the history as it was and the session usable.
                match outcome {
                    JobOutcome::Succeeded(JobPayload::Answered {
                        answer,
                        history: updated,
                    }) => {
                        history = updated;
                        println!("{}\n", answer.text.trim());
                    }
                    JobOutcome::Failed(report) => eprintln!("error: {}", report.trace),
                    JobOutcome::Cancelled => eprintln!("cancelled"),
                    JobOutcome::Succeeded(_) => eprintln!("error: unexpected job result"),
                }
            }
        }
        Command::Summarize { paths, clusters } => {
            let payload = run(
                &worker,
                Job::Summarize {
                    paths: expand_inputs(&paths),
                    clusters,
                },
            )
            .await?;

            if let JobPayload::Summarized(summary) = payload {
                info!(
                    chunks = summary.chunk_count,
                    representatives = ?summary.representative_ids,
                    "summary ready"
                );
                println!("{}", summary.text.trim());
            }
        }
    }

    Ok(())
}

async fn run(worker: &PipelineWorker, job: Job) -> anyhow::Result<JobPayload> {
    match worker.submit(job).outcome().await {
        JobOutcome::Succeeded(payload) => Ok(payload),
        JobOutcome::Failed(report) => bail!("{}", report.trace),
        JobOutcome::Cancelled => bail!("job cancelled"),
    }
}

fn read_metrics(path: Option<&PathBuf>) -> anyhow::Result<Option<Value>> {
    path.map(|path| {
        load_metrics(path).with_context(|| format!("failed to read metrics {}", path.display()))
    })
    .transpose()
}
