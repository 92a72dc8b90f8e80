//! Error types for the hyperlink conversion pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a deck's plain-text links.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: bad URL, missing field, oversized payload.
    /// Surfaced immediately, never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Network-class failure during fetch or publish. Retried up to the
    /// configured bound, then surfaced.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A phase exceeded its time budget, or the overall budget ran out.
    #[error("Phase '{phase}' exceeded its time budget")]
    Timeout {
        /// Name of the phase that was cancelled.
        phase: &'static str,
    },

    /// The publish target is unusable (e.g. missing endpoint). Fails
    /// fast before any phase starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The deck contained no convertible links. A distinct non-error
    /// outcome, not a pipeline failure.
    #[error("No media or game links found in the presentation")]
    NoLinks,

    /// The package container could not be opened or is missing required
    /// parts. Fatal for the whole job.
    #[error("Package error: {0}")]
    Package(String),

    /// XML parsing error inside a package part.
    #[error("XML parsing error: {0}")]
    Xml(String),

    /// Failed to read or write a local file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure. Carries only a correlation id so callers can
    /// find the logs without seeing implementation detail.
    #[error("Internal error (correlation id: {correlation_id})")]
    Internal {
        /// Opaque identifier tying the response to the job's log lines.
        correlation_id: String,
    },
}

impl Error {
    /// Whether a retry could plausibly change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}
