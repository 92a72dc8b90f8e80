//! Pipeline tuning knobs with defaults sized for interactive use.

use std::path::PathBuf;
use std::time::Duration;

/// Maximum accepted deck size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Configuration for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// TCP connect timeout for the fetch adapter.
    pub connect_timeout: Duration,
    /// Read timeout for the fetch adapter.
    pub read_timeout: Duration,
    /// Byte ceiling enforced while streaming the input deck.
    pub max_file_size: u64,
    /// Retry bound for transient fetch/publish failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    /// Wall-clock budget for the fetch phase, retries included.
    pub fetch_budget: Duration,
    /// Wall-clock budget for link extraction.
    pub extract_budget: Duration,
    /// Wall-clock budget for document rewriting and re-serialization.
    pub rewrite_budget: Duration,
    /// Wall-clock budget for the publish phase, retries included.
    pub publish_budget: Duration,
    /// Overall job deadline. A phase is not started once this is spent.
    pub overall_budget: Duration,
    /// Replace visible URL text with a category label.
    pub use_labels: bool,
    /// Parent directory for per-job scratch areas. `None` uses the
    /// system temp directory.
    pub scratch_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(15),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            fetch_budget: Duration::from_secs(30),
            extract_budget: Duration::from_secs(20),
            rewrite_budget: Duration::from_secs(15),
            publish_budget: Duration::from_secs(30),
            overall_budget: Duration::from_secs(120),
            use_labels: false,
            scratch_root: None,
        }
    }
}

impl PipelineConfig {
    /// Create a config with default budgets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deck size ceiling.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Enable or disable label mode.
    pub fn with_labels(mut self, use_labels: bool) -> Self {
        self.use_labels = use_labels;
        self
    }

    /// Set the overall job deadline.
    pub fn with_overall_budget(mut self, budget: Duration) -> Self {
        self.overall_budget = budget;
        self
    }
}
