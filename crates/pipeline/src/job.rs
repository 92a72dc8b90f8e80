//! Bounded-time job orchestration.
//!
//! One job sequences fetch, extract, rewrite, and publish, each under
//! its own wall-clock budget plus an overall deadline. Fetch and
//! publish retry transient failures with exponential backoff; extract
//! and rewrite are deterministic transformations of in-hand data and
//! are never retried, only timeout-guarded. A phase that overruns its
//! budget is abandoned: its task may still run in the background but
//! its result is discarded and never observed by the job.

use serde::Serialize;
use slidelink_core::{Error, Result};
use slidelink_pptx::DeckPackage;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::extract::LinkExtractor;
use crate::fetch::Fetcher;
use crate::publish::Publisher;
use crate::rewrite::DocumentRewriter;

/// Lifecycle of one job. `Failed` carries a short reason so the phase
/// is self-describing wherever it is logged or serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobPhase {
    Queued,
    Fetching,
    Extracting,
    Rewriting,
    Publishing,
    Completed,
    Failed { reason: String },
}

/// Ephemeral per-request state. Owns nothing long-lived beyond its
/// scratch directory, which is released on every exit path.
#[derive(Debug)]
pub struct ProcessingJob {
    id: Uuid,
    phase: JobPhase,
    started_at: Instant,
}

impl ProcessingJob {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: JobPhase::Queued,
            started_at: Instant::now(),
        }
    }

    fn advance(&mut self, phase: JobPhase) {
        log::debug!("Job {}: {:?} -> {:?}", self.id, self.phase, phase);
        self.phase = phase;
    }
}

/// Per-phase timings for the job report, in seconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub fetch_secs: f64,
    pub extract_secs: f64,
    pub rewrite_secs: f64,
    pub publish_secs: f64,
    pub total_secs: f64,
}

/// Outcome of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub links_found: Vec<String>,
    pub links_converted: usize,
    pub download_url: String,
    pub timings: PhaseTimings,
}

/// Sequences the pipeline phases for one job at a time.
///
/// Adapters are injected at construction; their configuration is
/// validated once before any phase runs.
pub struct Orchestrator {
    fetcher: Box<dyn Fetcher>,
    publisher: Box<dyn Publisher>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        publisher: Box<dyn Publisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            publisher,
            config,
        }
    }

    /// Run one job end to end against a source reference.
    pub async fn run(&self, source: &str) -> Result<JobReport> {
        let mut job = ProcessingJob::new();
        log::info!("Job {}: processing deck from '{}'", job.id, source);

        // Unusable publish target fails before any phase starts.
        self.publisher.validate()?;

        // Scratch area exclusively owned by this job; deleted when this
        // guard drops, on success, failure, or timeout alike.
        let scratch = match &self.config.scratch_root {
            Some(root) => tempfile::Builder::new()
                .prefix("slidelink-job-")
                .tempdir_in(root)?,
            None => tempfile::Builder::new().prefix("slidelink-job-").tempdir()?,
        };

        let result = self.run_phases(&mut job, source, scratch.path()).await;

        match &result {
            Ok(report) => {
                job.advance(JobPhase::Completed);
                log::info!(
                    "Job {}: completed with {} conversion(s) in {:.2}s",
                    job.id,
                    report.links_converted,
                    report.timings.total_secs
                );
            }
            Err(e) => {
                job.advance(JobPhase::Failed {
                    reason: e.to_string(),
                });
                log::error!("Job {}: failed: {}", job.id, e);
            }
        }

        result
    }

    async fn run_phases(
        &self,
        job: &mut ProcessingJob,
        source: &str,
        scratch: &Path,
    ) -> Result<JobReport> {
        let clock = JobClock {
            started: job.started_at,
            overall: self.config.overall_budget,
        };
        let mut timings = PhaseTimings::default();

        // Fetching: retried on transient failures only.
        job.advance(JobPhase::Fetching);
        let phase_started = Instant::now();
        let bytes = self
            .bounded(&clock, "fetch", self.config.fetch_budget, async {
                self.with_retry("fetch", || self.fetcher.fetch(source)).await
            })
            .await?;
        timings.fetch_secs = phase_started.elapsed().as_secs_f64();
        tokio::fs::write(scratch.join("input.pptx"), &bytes).await?;
        log::info!("Job {}: fetched {} bytes", job.id, bytes.len());

        // Extracting: deterministic, never retried, abandoned on timeout.
        job.advance(JobPhase::Extracting);
        let phase_started = Instant::now();
        let job_id = job.id;
        let (package, document, links) = self
            .bounded(&clock, "extract", self.config.extract_budget, async move {
                let handle = tokio::task::spawn_blocking(move || {
                    let package = DeckPackage::open(&bytes)?;
                    let document = package.load_document()?;
                    let links = LinkExtractor::new().extract(&package, &document);
                    Ok::<_, Error>((package, document, links))
                });
                handle.await.map_err(|e| internal_error(job_id, &e))?
            })
            .await?;
        timings.extract_secs = phase_started.elapsed().as_secs_f64();

        if links.is_empty() {
            return Err(Error::NoLinks);
        }
        let links_found = links.clean_urls();
        log::info!("Job {}: found {} link(s)", job.id, links.len());

        // Rewriting: deterministic, never retried, abandoned on timeout.
        job.advance(JobPhase::Rewriting);
        let phase_started = Instant::now();
        let use_labels = self.config.use_labels;
        let (output, conversions) = self
            .bounded(&clock, "rewrite", self.config.rewrite_budget, async move {
                let handle = tokio::task::spawn_blocking(move || {
                    let mut document = document;
                    let rewriter = DocumentRewriter::new().with_labels(use_labels);
                    let conversions = rewriter.rewrite(&mut document, &links);
                    let output = package.save(&document)?;
                    Ok::<_, Error>((output, conversions))
                });
                handle.await.map_err(|e| internal_error(job_id, &e))?
            })
            .await?;
        timings.rewrite_secs = phase_started.elapsed().as_secs_f64();
        tokio::fs::write(scratch.join("output.pptx"), &output).await?;
        log::info!("Job {}: made {} hyperlink conversion(s)", job.id, conversions);

        // Publishing: retried on transient failures only.
        job.advance(JobPhase::Publishing);
        let phase_started = Instant::now();
        let key = format!(
            "processed_pptx/hyperlink_converted_{}.pptx",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        );
        let download_url = self
            .bounded(&clock, "publish", self.config.publish_budget, async {
                self.with_retry("publish", || self.publisher.publish(&output, &key))
                    .await
            })
            .await?;
        timings.publish_secs = phase_started.elapsed().as_secs_f64();

        timings.total_secs = job.started_at.elapsed().as_secs_f64();

        Ok(JobReport {
            job_id: job.id.to_string(),
            links_found,
            links_converted: conversions,
            download_url,
            timings,
        })
    }

    /// Run a phase under the smaller of its own budget and the job's
    /// remaining overall budget. If the overall budget is already spent
    /// the phase is not started. On timeout the future is dropped and
    /// its work abandoned.
    async fn bounded<T>(
        &self,
        clock: &JobClock,
        phase: &'static str,
        budget: Duration,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let remaining = clock.remaining(phase)?;
        let allowed = budget.min(remaining);
        log::debug!("Phase '{}' starting with a {:?} budget", phase, allowed);

        match tokio::time::timeout(allowed, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Phase '{}' exceeded its {:?} budget; abandoned", phase, allowed);
                Err(Error::Timeout { phase })
            }
        }
    }

    /// Retry an operation on transient failures, with exponential
    /// backoff, up to the configured bound.
    async fn with_retry<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                    log::warn!(
                        "{} attempt {} failed ({}); retrying in {:?}",
                        what,
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Tracks the job's overall deadline.
struct JobClock {
    started: Instant,
    overall: Duration,
}

impl JobClock {
    /// Remaining overall budget, or a timeout error naming the phase
    /// that could not be started.
    fn remaining(&self, phase: &'static str) -> Result<Duration> {
        self.overall
            .checked_sub(self.started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or(Error::Timeout { phase })
    }
}

fn internal_error(job_id: Uuid, e: &tokio::task::JoinError) -> Error {
    log::error!("Job {}: worker task failed: {}", job_id, e);
    Error::Internal {
        correlation_id: job_id.to_string(),
    }
}
