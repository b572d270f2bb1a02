use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::{build_pipeline, report_failure};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::IngestRequest;
use crate::utils::{
    RetryConfig, RetryResult, is_text_file, read_file_content, title_from_path, with_retry,
};

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true, help = "Plain-text file to ingest")]
    pub file: PathBuf,

    #[arg(long, short = 't', help = "Document title (defaults to the file name)")]
    pub title: Option<String>,

    #[arg(
        long,
        short = 'm',
        help = "Metadata as a JSON object, e.g. '{\"lang\":\"en\"}'"
    )]
    pub metadata: Option<String>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Retry a failed ingestion this many times on transient errors"
    )]
    pub retries: u32,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    if !args.file.is_file() {
        anyhow::bail!("not a file: {}", args.file.display());
    }
    if !is_text_file(&args.file) {
        anyhow::bail!(
            "{} is not a plain-text file; extract its text first",
            args.file.display()
        );
    }

    let text = read_file_content(&args.file, config.chunking.max_file_size)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let metadata = args
        .metadata
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--metadata is not valid JSON")?;

    let title = args.title.clone().or_else(|| title_from_path(&args.file));
    let path = args
        .file
        .canonicalize()
        .unwrap_or_else(|_| args.file.clone())
        .to_string_lossy()
        .into_owned();

    let mut request = IngestRequest::new(text).with_path(path);
    request.title = title;
    request.metadata = metadata;

    if verbose {
        eprintln!("Ingesting: {}", args.file.display());
        eprintln!("  Title: {}", request.title.as_deref().unwrap_or("(none)"));
        eprintln!(
            "  Chunking: {} tokens, {} overlap",
            config.chunking.chunk_size, config.chunking.chunk_overlap
        );
    }

    let pipeline = build_pipeline(&config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .context("invalid progress template")?,
    );
    spinner.set_message("Chunking and embedding");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let retry = RetryConfig::with_retries(args.retries);
    let result = with_retry(&retry, || pipeline.ingest(request.clone())).await;
    spinner.finish_and_clear();

    let attempts = result.attempts();
    if verbose && attempts > 1 {
        eprintln!("Made {attempts} attempts");
    }

    match result {
        RetryResult::Success { value, .. } => {
            print!("{}", formatter.format_ingest(&value));
            Ok(())
        }
        RetryResult::Failed { last_error, .. } => Err(report_failure(
            formatter.as_ref(),
            "ingestion",
            &last_error,
            verbose,
        )),
    }
}
