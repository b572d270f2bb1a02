use anyhow::Result;
use clap::Args;

use super::{build_pipeline, document_filter, report_failure};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer from stored documents")]
    pub query: String,

    #[arg(
        long = "document",
        short = 'd',
        help = "Only use documents with this title as context (repeatable)"
    )]
    pub documents: Vec<String>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let config = Config::load()?.config;
    let formatter = get_formatter(format);
    let filter = document_filter(&args.documents);

    if verbose {
        eprintln!("Question: \"{query}\"");
        eprintln!("  Model: {}", config.llm.model);
        eprintln!("  Context chunks: {}", config.retrieval.default_top_k);
    }

    let pipeline = build_pipeline(&config).await?;

    match pipeline.answer(query, filter.as_deref()).await {
        Ok(answer) => {
            print!("{}", formatter.format_answer(&answer));
            Ok(())
        }
        Err(e) => Err(report_failure(formatter.as_ref(), "answering", &e, verbose)),
    }
}
