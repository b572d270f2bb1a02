//! Prompt context assembly.

use crate::models::SimilarityResult;

/// Question-answering prompt. `{context_str}` and `{query_str}` are substituted.
pub const QA_TEMPLATE: &str = "You are provided with relevant context information below. \
Please use this to help answer the question accurately. \n\
---------------------\n\
{context_str}\n\
---------------------\n\
Based on the context above, please answer the following question as clearly and precisely as possible: {query_str}\n\
If the information provided does not fully answer the question, respond with 'I don't know'.";

/// Answer the model gives when the context does not cover the question.
pub const UNKNOWN_MARKER: &str = "I don't know";

/// Joins ranked chunks into a context block and renders the QA prompt.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    max_context_chars: Option<usize>,
}

impl ContextAssembler {
    pub fn new(max_context_chars: Option<usize>) -> Self {
        Self { max_context_chars }
    }

    /// Join chunk texts in rank order, one per line.
    ///
    /// With a character bound set, chunks are taken while the joined text fits;
    /// the first chunk that would overflow and everything after it are dropped.
    pub fn context(&self, results: &[SimilarityResult]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            let separator = if i == 0 { 0 } else { 1 };
            if let Some(limit) = self.max_context_chars {
                let projected =
                    context.chars().count() + separator + result.chunk_text.chars().count();
                if projected > limit {
                    break;
                }
            }
            if separator == 1 {
                context.push('\n');
            }
            context.push_str(&result.chunk_text);
        }

        context
    }

    /// Render the QA prompt for `query` over `results`.
    ///
    /// An empty result set renders with an empty context block.
    pub fn assemble(&self, query: &str, results: &[SimilarityResult]) -> String {
        render(&self.context(results), query)
    }
}

fn render(context: &str, query: &str) -> String {
    // Substitute the query last so braces in retrieved text are never re-expanded.
    let (head, tail) = QA_TEMPLATE
        .split_once("{query_str}")
        .unwrap_or((QA_TEMPLATE, ""));
    let head = head.replacen("{context_str}", context, 1);
    format!("{head}{query}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: i64, text: &str) -> SimilarityResult {
        SimilarityResult {
            chunk_id: id,
            document_title: Some("Doc".to_string()),
            chunk_text: text.to_string(),
            similarity: 0.5,
        }
    }

    #[test]
    fn test_context_joins_in_rank_order() {
        let assembler = ContextAssembler::default();
        let results = vec![result(2, "second ranked first"), result(1, "then this")];
        assert_eq!(
            assembler.context(&results),
            "second ranked first\nthen this"
        );
    }

    #[test]
    fn test_empty_results_render_empty_context() {
        let prompt = ContextAssembler::default().assemble("What is Rust?", &[]);
        assert!(prompt.contains("---------------------\n\n---------------------"));
        assert!(prompt.contains("What is Rust?"));
        assert!(prompt.contains(UNKNOWN_MARKER));
    }

    #[test]
    fn test_prompt_contains_context_and_query() {
        let prompt = ContextAssembler::default()
            .assemble("Who wrote it?", &[result(1, "It was written by Ada.")]);
        assert!(prompt.contains("It was written by Ada.\n---------------------"));
        assert!(prompt.contains("precisely as possible: Who wrote it?\n"));
        assert!(!prompt.contains("{context_str}"));
        assert!(!prompt.contains("{query_str}"));
    }

    #[test]
    fn test_placeholders_in_chunks_are_not_expanded() {
        let prompt = ContextAssembler::default().assemble("q", &[result(1, "literal {query_str}")]);
        assert!(prompt.contains("literal {query_str}"));
    }

    #[test]
    fn test_char_bound_drops_overflowing_tail() {
        let assembler = ContextAssembler::new(Some(12));
        let results = vec![result(1, "aaaaa"), result(2, "bbbbbb"), result(3, "c")];
        // "aaaaa\nbbbbbb" is exactly 12 characters; "c" would overflow.
        assert_eq!(assembler.context(&results), "aaaaa\nbbbbbb");

        let tight = ContextAssembler::new(Some(3));
        assert_eq!(tight.context(&results), "");
    }
}
