use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Answer, DocumentSummary, IngestOutcome, OutputFormat, RetrievalResults};

pub trait Formatter {
    fn format_ingest(&self, outcome: &IngestOutcome) -> String;
    fn format_retrieval(&self, results: &RetrievalResults) -> String;
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_documents(&self, documents: &[DocumentSummary]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub database: DatabaseStatus,
    pub embedding: ServiceStatus,
    pub llm: ServiceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub driver: String,
    pub url: String,
    pub connected: bool,
    pub documents: u64,
    pub chunks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub url: String,
    pub model: String,
    pub available: bool,
}

const PREVIEW_CHARS: usize = 300;

fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", head)
    } else {
        head
    }
}

fn title_or_untitled(title: Option<&str>) -> &str {
    title.unwrap_or("(untitled)")
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_ingest(&self, outcome: &IngestOutcome) -> String {
        let mut output = String::new();
        writeln!(output, "{}", outcome.message).unwrap();
        writeln!(output, "Document ID:    {}", outcome.document_id).unwrap();
        writeln!(output, "Chunks created: {}", outcome.chunks_created).unwrap();
        writeln!(output, "Timestamp:      {}", outcome.timestamp).unwrap();
        output
    }

    fn format_retrieval(&self, results: &RetrievalResults) -> String {
        if results.is_empty() {
            return format!("No matching chunks for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} chunks in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, row) in results.results.iter().enumerate() {
            writeln!(output, "{}. [Similarity: {:.4}]", i + 1, row.similarity).unwrap();
            writeln!(
                output,
                "   Document: {}",
                title_or_untitled(row.document_name.as_deref())
            )
            .unwrap();
            writeln!(output, "   ---").unwrap();
            for line in preview(&row.chunk_text).lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_answer(&self, answer: &Answer) -> String {
        format!("Q: {}\n\n{}\n", answer.query, answer.answer.trim_end())
    }

    fn format_documents(&self, documents: &[DocumentSummary]) -> String {
        if documents.is_empty() {
            return "No documents stored.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Documents").unwrap();
        writeln!(output, "---------").unwrap();
        for doc in documents {
            writeln!(
                output,
                "  [{}] {} ({} chunks)",
                doc.id,
                title_or_untitled(doc.title.as_deref()),
                doc.chunk_count
            )
            .unwrap();
            let created = doc.created_at.to_rfc3339();
            writeln!(output, "      {}  {}", doc.path, created).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mark = |ok: bool| if ok { "[OK]" } else { "[UNAVAILABLE]" };
        let db = &status.database;

        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Database:   {} {}", db.driver, mark(db.connected)).unwrap();
        writeln!(output, "  URL:        {}", db.url).unwrap();
        if db.connected {
            writeln!(output, "  Documents:  {}", db.documents).unwrap();
            writeln!(output, "  Chunks:     {}", db.chunks).unwrap();
        }
        writeln!(output).unwrap();
        writeln!(output, "Embedding:  {}", mark(status.embedding.available)).unwrap();
        writeln!(output, "  URL:        {}", status.embedding.url).unwrap();
        writeln!(output, "  Model:      {}", status.embedding.model).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "LLM:        {}", mark(status.llm.available)).unwrap();
        writeln!(output, "  URL:        {}", status.llm.url).unwrap();
        writeln!(output, "  Model:      {}", status.llm.model).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_ingest(&self, outcome: &IngestOutcome) -> String {
        self.render(outcome)
    }

    fn format_retrieval(&self, results: &RetrievalResults) -> String {
        self.render(results)
    }

    fn format_answer(&self, answer: &Answer) -> String {
        self.render(answer)
    }

    fn format_documents(&self, documents: &[DocumentSummary]) -> String {
        self.render(&serde_json::json!({ "documents": documents }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_ingest(&self, outcome: &IngestOutcome) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion {}\n", outcome.status).unwrap();
        writeln!(output, "| Field | Value |").unwrap();
        writeln!(output, "|-------|-------|").unwrap();
        writeln!(output, "| Document ID | {} |", outcome.document_id).unwrap();
        writeln!(output, "| Chunks created | {} |", outcome.chunks_created).unwrap();
        writeln!(output, "| Timestamp | {} |", outcome.timestamp).unwrap();
        output
    }

    fn format_retrieval(&self, results: &RetrievalResults) -> String {
        if results.is_empty() {
            return format!("## No matching chunks\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Retrieved Chunks\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();

        for (i, row) in results.results.iter().enumerate() {
            writeln!(output, "### {}. Similarity: {:.4}\n", i + 1, row.similarity).unwrap();
            writeln!(
                output,
                "**Document:** {}\n",
                title_or_untitled(row.document_name.as_deref())
            )
            .unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", row.chunk_text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_answer(&self, answer: &Answer) -> String {
        format!(
            "## Answer\n\n**Question:** {}\n\n{}\n",
            answer.query,
            answer.answer.trim_end()
        )
    }

    fn format_documents(&self, documents: &[DocumentSummary]) -> String {
        if documents.is_empty() {
            return "## Documents\n\n*No documents stored.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Documents\n").unwrap();
        writeln!(output, "| ID | Title | Path | Chunks | Created |").unwrap();
        writeln!(output, "|----|-------|------|--------|---------|").unwrap();
        for doc in documents {
            writeln!(
                output,
                "| {} | {} | `{}` | {} | {} |",
                doc.id,
                title_or_untitled(doc.title.as_deref()),
                doc.path,
                doc.chunk_count,
                doc.created_at.to_rfc3339()
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        let db = &status.database;

        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        let connected = mark(db.connected);
        writeln!(output, "### Database ({}) {}\n", db.driver, connected).unwrap();
        writeln!(output, "- **URL:** `{}`", db.url).unwrap();
        writeln!(output, "- **Documents:** {}", db.documents).unwrap();
        writeln!(output, "- **Chunks:** {}\n", db.chunks).unwrap();
        let embedding = mark(status.embedding.available);
        writeln!(output, "### Embedding {}\n", embedding).unwrap();
        writeln!(output, "- **URL:** `{}`", status.embedding.url).unwrap();
        writeln!(output, "- **Model:** {}\n", status.embedding.model).unwrap();
        writeln!(output, "### LLM {}\n", mark(status.llm.available)).unwrap();
        writeln!(output, "- **URL:** `{}`", status.llm.url).unwrap();
        writeln!(output, "- **Model:** {}", status.llm.model).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
