//! CLI module for the retrieval pipeline.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ingest documents and answer questions from them with a language model.
#[derive(Debug, Parser)]
#[command(name = "ragpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Chunk, embed and store a plain-text document
    Ingest(commands::IngestArgs),

    /// Show the stored chunks most similar to a query
    Retrieve(commands::RetrieveArgs),

    /// Answer a question using retrieved chunks as context
    Ask(commands::AskArgs),

    /// Delete a document and its chunks
    Delete(commands::DeleteArgs),

    /// List stored documents
    Documents,

    /// Check database, embedding server and language model
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
