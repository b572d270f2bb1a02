use anyhow::Result;

use crate::cli::output::{DatabaseStatus, ServiceStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{Embedder, HttpEmbedder, LanguageModel, OllamaClient, create_backend};

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let mut database = DatabaseStatus {
        driver: config.vector_store.driver.to_string(),
        url: config.vector_store.redacted_url(),
        connected: false,
        documents: 0,
        chunks: 0,
    };
    match create_backend(&config.vector_store, config.embedding.dimension as usize).await {
        Ok(store) => {
            database.connected = store.health_check().await.is_ok();
            if database.connected
                && let Ok(stats) = store.stats().await
            {
                database.documents = stats.documents;
                database.chunks = stats.chunks;
            }
        }
        Err(e) => {
            if verbose {
                eprintln!("Vector store: {e}");
            }
        }
    }

    let embedding_available = match HttpEmbedder::new(&config.embedding) {
        Ok(client) => client.health_check().await.is_ok(),
        Err(_) => false,
    };
    let llm_available = match OllamaClient::new(&config.llm) {
        Ok(client) => client.health_check().await.is_ok(),
        Err(_) => false,
    };

    let status = StatusInfo {
        database,
        embedding: ServiceStatus {
            url: config.embedding.url.clone(),
            model: config.embedding.model.clone(),
            available: embedding_available,
        },
        llm: ServiceStatus {
            url: config.llm.url.clone(),
            model: config.llm.model.clone(),
            available: llm_available,
        },
    };

    print!("{}", formatter.format_status(&status));

    if !status.database.connected && config.vector_store.driver == VectorDriver::PostgreSQL {
        eprintln!("Warning: PostgreSQL not accessible. Check vector_store.url and pgvector.");
    }
    if !embedding_available {
        let url = &config.embedding.url;
        eprintln!("Warning: embedding server not reachable at {url}");
    }
    if !llm_available {
        let url = &config.llm.url;
        eprintln!("Warning: language model not reachable at {url}");
    }

    Ok(())
}
