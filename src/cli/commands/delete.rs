use anyhow::Result;
use clap::Args;

use super::{build_pipeline, report_failure};
use crate::cli::output::get_formatter;
use crate::models::{Config, DocumentId, OutputFormat};

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(required = true, help = "ID of the document to delete")]
    pub document_id: DocumentId,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub force: bool,
}

pub async fn handle_delete(args: DeleteArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    if !args.force {
        println!(
            "This will delete document {} and all of its chunks. Continue? [y/N]",
            args.document_id
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let pipeline = build_pipeline(&config).await?;
    let deleted = match pipeline.delete_document(args.document_id).await {
        Ok(deleted) => deleted,
        Err(e) => return Err(report_failure(formatter.as_ref(), "deletion", &e, verbose)),
    };

    let message = if deleted {
        format!("Deleted document {}.", args.document_id)
    } else {
        format!("Document {} does not exist.", args.document_id)
    };
    println!("{}", formatter.format_message(&message));
    Ok(())
}
