//! CLI for converting plain-text URLs in slide decks into hyperlinks.

use anyhow::{Context, Result};
use clap::Parser;
use slidelink_core::Error;
use slidelink_pipeline::{
    FileFetcher, Fetcher, FsPublisher, HttpFetcher, HttpPublisher, Orchestrator, PipelineConfig,
    Publisher,
};
use std::path::PathBuf;
use std::time::Duration;

/// Convert recognized URLs in a PowerPoint deck into clickable hyperlinks.
#[derive(Parser, Debug)]
#[command(name = "slidelink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input deck: a local .pptx path or an http(s) URL
    input: String,

    /// Output directory for the converted deck (ignored with --endpoint)
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Publish the converted deck with an HTTP PUT to this endpoint
    /// instead of writing it locally
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Replace the visible URL text with a category label
    /// ("play audio", "open game", ...)
    #[arg(short, long)]
    label: bool,

    /// Maximum accepted deck size, in MiB
    #[arg(long, default_value = "50")]
    max_size: u64,

    /// Overall job deadline, in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = PipelineConfig::new()
        .with_max_file_size(args.max_size * 1024 * 1024)
        .with_labels(args.label)
        .with_overall_budget(Duration::from_secs(args.timeout));

    let fetcher: Box<dyn Fetcher> = if is_http_url(&args.input) {
        Box::new(
            HttpFetcher::new(
                config.connect_timeout,
                config.read_timeout,
                config.max_file_size,
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        )
    } else {
        Box::new(FileFetcher::new(config.max_file_size))
    };

    let publisher: Box<dyn Publisher> = match &args.endpoint {
        Some(endpoint) => Box::new(
            HttpPublisher::new(endpoint.clone()).map_err(|e| anyhow::anyhow!("{}", e))?,
        ),
        None => Box::new(FsPublisher::new(&args.output)),
    };

    let orchestrator = Orchestrator::new(fetcher, publisher, config);

    match orchestrator.run(&args.input).await {
        Ok(report) => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize the job report")?;
            println!("{}", json);
            Ok(())
        }
        Err(Error::NoLinks) => {
            eprintln!("No URLs found in the presentation that require conversion");
            std::process::exit(2);
        }
        Err(e) => Err(anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to process '{}'", args.input)),
    }
}

fn is_http_url(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
