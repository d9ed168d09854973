use crate::error::{error_report, PipelineError};
use crate::history::ConversationHistory;
use crate::index::FlatL2Index;
use crate::models::IngestionReport;
use crate::orchestrator::{Answer, RagPipeline, Summary};
use crate::traits::VectorIndex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub enum Job {
    Process {
        paths: Vec<PathBuf>,
    },
    Ask {
        question: String,
        history: ConversationHistory,
        metrics: Option<Value>,
    },
    Summarize {
        paths: Vec<PathBuf>,
        clusters: Option<usize>,
    },
}

#[derive(Debug, Clone)]
pub enum JobPayload {
    Processed(IngestionReport),
    Answered {
        answer: Answer,
        history: ConversationHistory,
    },
    Summarized(Summary),
}

#[derive(Debug, Clone)]
pub struct FailureReport {
    pub message: String,
    pub trace: String,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(JobPayload),
    Failed(FailureReport),
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum JobEvent {
    Outcome(JobOutcome),
    Finished,
}

pub struct JobHandle {
    id: Uuid,
    events: mpsc::UnboundedReceiver<JobEvent>,
    cancel: CancellationFlag,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    pub async fn outcome(mut self) -> JobOutcome {
        let mut outcome = None;
        while let Some(event) = self.events.recv().await {
            match event {
                JobEvent::Outcome(reported) => outcome = Some(reported),
                JobEvent::Finished => break,
            }
        }
        outcome.unwrap_or_else(|| {
            JobOutcome::Failed(FailureReport {
                message: "job ended without reporting an outcome".to_string(),
                trace: String::new(),
            })
        })
    }
}

pub struct PipelineWorker<I = FlatL2Index> {
    pipeline: Arc<Mutex<RagPipeline<I>>>,
}

impl<I> Clone for PipelineWorker<I> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<I> PipelineWorker<I>
where
    I: VectorIndex + 'static,
{
    pub fn new(pipeline: RagPipeline<I>) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
        }
    }

    pub fn pipeline(&self) -> Arc<Mutex<RagPipeline<I>>> {
        Arc::clone(&self.pipeline)
    }

    pub fn submit(&self, job: Job) -> JobHandle {
        let id = Uuid::new_v4();
        let (sender, events) = mpsc::unbounded_channel();
        let cancel = CancellationFlag::default();

        let pipeline = Arc::clone(&self.pipeline);
        let flag = cancel.clone();
        let span = info_span!("job", %id);

        tokio::spawn(
            async move {
                let run = tokio::spawn(run_job(pipeline, job, flag).in_current_span());
                let outcome = match run.await {
                    Ok(Ok(payload)) => JobOutcome::Succeeded(payload),
                    Ok(Err(PipelineError::Cancelled)) => JobOutcome::Cancelled,
                    Ok(Err(failure)) => {
                        let trace = error_report(&failure);
                        error!(error = %trace, "job failed");
                        JobOutcome::Failed(FailureReport {
                            message: failure.to_string(),
                            trace,
                        })
                    }
                    Err(join_error) => {
                        error!(error = %join_error, "job aborted");
                        JobOutcome::Failed(FailureReport {
                            message: "job aborted unexpectedly".to_string(),
                            trace: join_error.to_string(),
                        })
                    }
                };

                let _ = sender.send(JobEvent::Outcome(outcome));
                let _ = sender.send(JobEvent::Finished);
            }
            .instrument(span),
        );

        JobHandle { id, events, cancel }
    }
}

async fn run_job<I>(
    pipeline: Arc<Mutex<RagPipeline<I>>>,
    job: Job,
    cancel: CancellationFlag,
) -> Result<JobPayload, PipelineError>
where
    I: VectorIndex,
{
    let mut pipeline = pipeline.lock().await;
    cancel.check()?;

    match job {
        Job::Process { paths } => pipeline
            .process(&paths, &cancel)
            .await
            .map(JobPayload::Processed),
        Job::Ask {
            question,
            mut history,
            metrics,
        } => {
            let answer = pipeline.ask(&question, &mut history, metrics.as_ref()).await?;
            Ok(JobPayload::Answered { answer, history })
        }
        Job::Summarize { paths, clusters } => pipeline
            .summarize(&paths, clusters, &cancel)
            .await
            .map(JobPayload::Summarized),
    }
}
