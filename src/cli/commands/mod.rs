mod ask;
mod config;
mod delete;
mod documents;
mod ingest;
mod retrieve;
mod status;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use delete::DeleteArgs;
pub use ingest::IngestArgs;
pub use retrieve::RetrieveArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use delete::handle_delete;
pub use documents::handle_documents;
pub use ingest::handle_ingest;
pub use retrieve::handle_retrieve;
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::output::Formatter;
use crate::error::PipelineError;
use crate::models::Config;
use crate::services::{
    ContextAssembler, EmbeddingGenerator, GenerationInvoker, HttpEmbedder, OllamaClient,
    RagPipeline, TextChunker, create_backend,
};

/// Construct every provider once and wire them into a pipeline.
pub(crate) async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    // Fetching a model tokenizer from the Hub is blocking I/O.
    let chunking = config.chunking.clone();
    let model = config.embedding.model.clone();
    let chunker = tokio::task::spawn_blocking(move || TextChunker::from_config(&chunking, &model))
        .await
        .context("chunker initialization was interrupted")?
        .context("failed to initialize chunker")?;

    let embedder = HttpEmbedder::new(&config.embedding).context("failed to create embedder")?;
    let embeddings =
        EmbeddingGenerator::with_capacity(Arc::new(embedder), config.embedding.cache_capacity);

    let store = create_backend(&config.vector_store, embeddings.dimension())
        .await
        .context("failed to open vector store")?;

    let llm = OllamaClient::new(&config.llm).context("failed to create language model client")?;

    Ok(RagPipeline::new(
        chunker,
        embeddings,
        store,
        ContextAssembler::new(config.retrieval.max_context_chars),
        GenerationInvoker::new(Arc::new(llm)),
    )
    .with_default_top_k(config.retrieval.default_top_k as usize))
}

/// A failure whose public summary has already been printed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ReportedFailure(&'static str);

/// Print only the public summary of `err`. The cause is logged, at `error`
/// level with `--verbose` and at `debug` otherwise.
pub(crate) fn report_failure(
    formatter: &dyn Formatter,
    action: &str,
    err: &PipelineError,
    verbose: bool,
) -> anyhow::Error {
    if verbose {
        tracing::error!(error = %err, "{action} failed");
    } else {
        tracing::debug!(error = %err, "{action} failed");
    }
    let message = formatter.format_error(err.public_message());
    eprintln!("{}", message.trim_end());
    ReportedFailure(err.public_message()).into()
}

/// Parse repeated `--document` values, dropping blanks. `None` means no filter.
pub(crate) fn document_filter(names: &[String]) -> Option<Vec<String>> {
    let names: Vec<String> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}
