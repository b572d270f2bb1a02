//! Retrieval and answer models.

use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A ranked chunk returned by a similarity search.
///
/// `similarity` is `1 - cosine_distance` at full precision; it is only
/// rounded when converted for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub chunk_id: i64,
    pub document_title: Option<String>,
    pub chunk_text: String,
    pub similarity: f64,
}

impl SimilarityResult {
    pub fn to_display(&self) -> RetrievedChunk {
        RetrievedChunk {
            document_name: self.document_title.clone(),
            chunk_text: self.chunk_text.clone(),
            similarity: round_similarity(self.similarity),
        }
    }
}

/// Presentation row for a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document_name: Option<String>,
    pub chunk_text: String,
    pub similarity: f64,
}

/// Round a similarity score to 4 decimal digits.
pub fn round_similarity(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Collection of retrieval rows for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResults {
    pub query: String,
    pub results: Vec<RetrievedChunk>,
    pub duration_ms: u64,
}

impl RetrievalResults {
    pub fn new(query: String, results: &[SimilarityResult], duration_ms: u64) -> Self {
        Self {
            query,
            results: results.iter().map(SimilarityResult::to_display).collect(),
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Generated answer for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_round_similarity() {
        assert_eq!(round_similarity(0.123_456), 0.1235);
        assert_eq!(round_similarity(0.95), 0.95);
        assert_eq!(round_similarity(-0.000_04), -0.0);
    }

    #[test]
    fn test_display_rounding_keeps_source_precision() {
        let result = SimilarityResult {
            chunk_id: 1,
            document_title: Some("Test Document".to_string()),
            chunk_text: "relevant".to_string(),
            similarity: 0.876_543_21,
        };
        let row = result.to_display();
        assert_eq!(row.similarity, 0.8765);
        assert_eq!(row.document_name.as_deref(), Some("Test Document"));
        assert_eq!(result.similarity, 0.876_543_21);
    }

    #[test]
    fn test_retrieval_results() {
        let results = RetrievalResults::new("q".to_string(), &[], 12);
        assert!(results.is_empty());
        assert_eq!(results.len(), 0);
        assert_eq!(results.duration_ms, 12);
    }
}
