//! Scrape jobs
//!
//! A [`ScrapeJob`] pairs a document with a flow (a flow file or an inline
//! flow) and a service name. [`run_job`] executes one job synchronously;
//! [`run_batch`] runs many in parallel on blocking threads, bounded by a
//! semaphore.

use crate::document::{load_document, ArenaDocument};
use crate::executor::FlowExecutor;
use crate::flow::FlowDefinition;
use crate::persist::{FileSink, MemorySink, Persistence};
use crate::vars::{ExecutionContext, Value, VarKind};
use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Variable seeded with the job's service name before the flow runs
pub const SERVICE_NAME_VAR: &str = "ServiceName";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    #[serde(default)]
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Local markup file to scrape
    #[serde(alias = "url_to_scrap")]
    pub document: PathBuf,
    /// Path of a flow file
    #[serde(default)]
    pub scrap_flow: Option<PathBuf>,
    /// Flow embedded in the job, as YAML or as a YAML string
    #[serde(default)]
    pub inline_scrap_flow: Option<serde_yaml::Value>,
}

/// One unit of scraping work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    #[serde(default)]
    pub params: JobParams,
    pub payload: JobPayload,
}

impl ScrapeJob {
    pub fn new(document: impl Into<PathBuf>, flow: impl Into<PathBuf>) -> Self {
        Self {
            params: JobParams::default(),
            payload: JobPayload {
                document: document.into(),
                scrap_flow: Some(flow.into()),
                inline_scrap_flow: None,
            },
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.params.service_name = Some(name.into());
        self
    }

    /// Resolve the job's flow; an inline flow takes precedence over a flow file
    pub fn flow(&self) -> Result<FlowDefinition> {
        if let Some(inline) = &self.payload.inline_scrap_flow {
            if self.payload.scrap_flow.is_some() {
                debug!("Job carries both a flow file and an inline flow, using the inline flow");
            }
            let flow = match inline {
                serde_yaml::Value::String(source) => FlowDefinition::from_yaml_str(source),
                other => FlowDefinition::from_yaml_value(other.clone()),
            };
            return flow.context("Invalid inline flow");
        }
        match &self.payload.scrap_flow {
            Some(path) => FlowDefinition::load(path)
                .with_context(|| format!("Failed to load flow {}", path.display())),
            None => Err(anyhow!(
                "Job for {} has neither scrap_flow nor inline_scrap_flow",
                self.payload.document.display()
            )),
        }
    }

    /// Make relative paths relative to `base` instead of the working directory
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.payload.document.is_relative() {
            self.payload.document = base.join(&self.payload.document);
        }
        if let Some(flow) = self.payload.scrap_flow.as_mut() {
            if flow.is_relative() {
                *flow = base.join(&*flow);
            }
        }
    }

    /// Name used for long output file names
    pub fn source_name(&self) -> String {
        self.payload
            .document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// How jobs write their output
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub output_dir: PathBuf,
    /// Keep saves in memory instead of writing files
    pub dry_run: bool,
}

/// Result of a successful job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub document: PathBuf,
    /// The flow's final value
    pub value: serde_json::Value,
    /// Files written, relative to the output directory in dry runs
    pub written: Vec<PathBuf>,
}

/// Run a single job to completion
pub fn run_job(job: &ScrapeJob, options: &JobOptions) -> Result<JobReport> {
    let flow = job.flow()?;
    let document = &job.payload.document;
    let doc = load_document(document)
        .with_context(|| format!("Failed to load document {}", document.display()))?;

    let mut ctx = ExecutionContext::new();
    let service_name = job
        .params
        .service_name
        .clone()
        .map_or(Value::Null, Value::Str);
    ctx.declare(SERVICE_NAME_VAR, VarKind::Scalar, Some(service_name));

    info!(
        "Running flow with {} actions on {}",
        flow.action_count(),
        document.display()
    );

    let (value, written) = if options.dry_run {
        let sink = MemorySink::new();
        let value = execute(&doc, &sink, &mut ctx, &flow, document)?;
        (value, sink.written())
    } else {
        let sink = FileSink::new(options.output_dir.clone(), job.source_name());
        let value = execute(&doc, &sink, &mut ctx, &flow, document)?;
        (value, sink.written())
    };

    Ok(JobReport {
        document: document.clone(),
        value: value.to_json(&doc),
        written,
    })
}

fn execute(
    doc: &ArenaDocument,
    sink: &dyn Persistence,
    ctx: &mut ExecutionContext,
    flow: &FlowDefinition,
    document: &Path,
) -> Result<Value> {
    FlowExecutor::new(doc, sink)
        .run(ctx, flow)
        .with_context(|| format!("Flow failed on {}", document.display()))
}

/// A batch file: a list of jobs, or a mapping with a `jobs:` list
#[derive(Debug, Clone, PartialEq)]
pub struct JobBatch {
    pub jobs: Vec<ScrapeJob>,
}

impl<'de> Deserialize<'de> for JobBatch {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum JobBatchHelper {
            WithJobsField { jobs: Vec<ScrapeJob> },
            Jobs(Vec<ScrapeJob>),
        }

        let jobs = match JobBatchHelper::deserialize(deserializer)? {
            JobBatchHelper::WithJobsField { jobs } => jobs,
            JobBatchHelper::Jobs(jobs) => jobs,
        };
        Ok(JobBatch { jobs })
    }
}

impl JobBatch {
    /// Read a batch file, resolving job paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file {}", path.display()))?;
        let mut batch: JobBatch = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid batch file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for job in &mut batch.jobs {
            job.resolve_paths(base);
        }
        debug!("Loaded {} jobs from {}", batch.jobs.len(), path.display());
        Ok(batch)
    }
}

/// Per-job result of a batch run
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub index: usize,
    pub document: PathBuf,
    pub result: std::result::Result<JobReport, String>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run jobs in parallel, at most `max_parallel` at a time
///
/// Every job runs to completion; failures are reported per job.
pub async fn run_batch(
    jobs: Vec<ScrapeJob>,
    options: &JobOptions,
    max_parallel: usize,
) -> Vec<JobOutcome> {
    let total_jobs = jobs.len();
    if total_jobs == 0 {
        info!("No jobs to run");
        return Vec::new();
    }
    let max_parallel = max_parallel.max(1);
    info!(
        "Running {} jobs with parallelism level {}",
        total_jobs, max_parallel
    );

    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let mut futures = Vec::with_capacity(total_jobs);
    for (index, job) in jobs.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let options = options.clone();

        let future = async move {
            let document = job.payload.document.clone();
            let result = match semaphore.acquire().await {
                Ok(_permit) => {
                    match tokio::task::spawn_blocking(move || run_job(&job, &options)).await {
                        Ok(Ok(report)) => Ok(report),
                        Ok(Err(e)) => Err(format!("{e:#}")),
                        Err(e) => Err(format!("job task failed: {e}")),
                    }
                }
                Err(e) => Err(format!("job scheduling failed: {e}")),
            };
            if let Err(message) = &result {
                error!("Job {} ({}) failed: {}", index + 1, document.display(), message);
            }
            JobOutcome {
                index,
                document,
                result,
            }
        };
        futures.push(future);
    }

    let outcomes = join_all(futures).await;
    let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
    if failed > 0 {
        warn!("{} of {} jobs failed", failed, total_jobs);
    }
    info!(
        "Batch completed: {} successful, {} failed",
        total_jobs - failed,
        failed
    );
    outcomes
}
