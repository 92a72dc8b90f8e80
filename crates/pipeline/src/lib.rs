//! Conversion pipeline: URL extraction, text-run rewriting, and the
//! bounded-time orchestration that sequences fetch, extract, rewrite,
//! and publish under per-phase budgets.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod publish;
pub mod rewrite;

pub use config::PipelineConfig;
pub use extract::LinkExtractor;
pub use fetch::{Fetcher, FileFetcher, HttpFetcher};
pub use job::{JobPhase, JobReport, Orchestrator};
pub use publish::{FsPublisher, HttpPublisher, Publisher};
pub use rewrite::DocumentRewriter;
