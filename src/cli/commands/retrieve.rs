use std::time::Instant;

use anyhow::Result;
use clap::Args;

use super::{build_pipeline, document_filter, report_failure};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, RetrievalResults};

#[derive(Debug, Args)]
pub struct RetrieveArgs {
    #[arg(required = true, help = "Query text")]
    pub query: String,

    #[arg(long, short = 'k', help = "Maximum number of chunks to return")]
    pub top_k: Option<u32>,

    #[arg(
        long = "document",
        short = 'd',
        help = "Only search documents with this title (repeatable)"
    )]
    pub documents: Vec<String>,
}

pub async fn handle_retrieve(
    args: RetrieveArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("query cannot be empty");
    }

    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let top_k = args.top_k.unwrap_or(config.retrieval.default_top_k);
    if top_k == 0 {
        anyhow::bail!("top_k must be at least 1");
    }

    let filter = document_filter(&args.documents);
    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Top-k: {top_k}");
        if let Some(ref names) = filter {
            eprintln!("  Documents: {}", names.join(", "));
        }
    }

    let pipeline = build_pipeline(&config).await?;
    let start = Instant::now();

    match pipeline
        .retrieve(query, top_k as usize, filter.as_deref())
        .await
    {
        Ok(results) => {
            let results = RetrievalResults::new(
                query.to_string(),
                &results,
                start.elapsed().as_millis() as u64,
            );
            print!("{}", formatter.format_retrieval(&results));
            Ok(())
        }
        Err(e) => Err(report_failure(formatter.as_ref(), "retrieval", &e, verbose)),
    }
}
