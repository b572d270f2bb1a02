use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use ragpipe::cli::commands::{
    ReportedFailure, handle_ask, handle_config, handle_delete, handle_documents, handle_ingest,
    handle_retrieve, handle_status,
};
use ragpipe::cli::{Cli, Commands};
use ragpipe::models::{Config, OutputFormat};

/// Log to stderr. `RUST_LOG` wins over `--verbose`; without either, stderr
/// carries only formatted command output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "ragpipe=debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format.unwrap_or_else(|| {
        Config::load()
            .map(|resolved| resolved.config.output.default_format)
            .unwrap_or_default()
    });
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, format, verbose) => {
            if let Err(e) = result {
                if e.is::<ReportedFailure>() {
                    std::process::exit(1);
                }
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, abandoning command");
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat, verbose: bool) -> Result<()> {
    match command {
        Commands::Ingest(args) => handle_ingest(args, format, verbose).await,
        Commands::Retrieve(args) => handle_retrieve(args, format, verbose).await,
        Commands::Ask(args) => handle_ask(args, format, verbose).await,
        Commands::Delete(args) => handle_delete(args, format, verbose).await,
        Commands::Documents => handle_documents(format, verbose).await,
        Commands::Status => handle_status(format, verbose).await,
        Commands::Config(cmd) => handle_config(cmd, format, verbose).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
