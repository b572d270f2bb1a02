//! Token-bounded text chunking with overlap.

use std::ops::Range;
use std::path::Path;

use regex::Regex;
use tokenizers::Tokenizer;

use crate::error::ChunkError;
use crate::models::{ChunkingConfig, TokenizerKind};

/// Splits text into tokens, reporting each token's byte span in the input.
pub trait TextTokenizer: Send + Sync {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError>;
}

/// Treats every maximal run of non-whitespace characters as one token.
#[derive(Debug, Clone)]
pub struct WhitespaceTokenizer {
    pattern: Regex,
}

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\S+").expect("static token pattern"),
        }
    }
}

impl Default for WhitespaceTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextTokenizer for WhitespaceTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError> {
        Ok(self.pattern.find_iter(text).map(|m| m.range()).collect())
    }
}

/// Model tokenizer loaded from a HuggingFace `tokenizer.json`.
pub struct HfTokenizer {
    tokenizer: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, ChunkError> {
        let tokenizer =
            Tokenizer::from_file(path).map_err(|e| ChunkError::TokenizerLoad(e.to_string()))?;
        Self::prepare(tokenizer)
    }

    /// Fetch the tokenizer published with `model` on the HuggingFace Hub.
    ///
    /// Blocks on network I/O the first time; later calls read the local hub cache.
    pub fn from_pretrained(model: &str) -> Result<Self, ChunkError> {
        let tokenizer = Tokenizer::from_pretrained(model, None)
            .map_err(|e| ChunkError::TokenizerLoad(format!("{model}: {e}")))?;
        Self::prepare(tokenizer)
    }

    fn prepare(mut tokenizer: Tokenizer) -> Result<Self, ChunkError> {
        // Chunking needs every token of the input, unpadded.
        tokenizer
            .with_truncation(None)
            .map_err(|e| ChunkError::TokenizerLoad(e.to_string()))?;
        tokenizer.with_padding(None);

        Ok(Self { tokenizer })
    }
}

impl TextTokenizer for HfTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| ChunkError::Tokenize(e.to_string()))?;

        // Byte-level tokenizers can emit several tokens for one character;
        // snap every span outward to character boundaries so slices stay valid.
        Ok(encoding
            .get_offsets()
            .iter()
            .filter(|(start, end)| end > start)
            .map(|&(start, end)| floor_char_boundary(text, start)..ceil_char_boundary(text, end))
            .collect())
    }
}

/// Splits text into chunks of at most `chunk_size` tokens, with adjacent
/// chunks sharing exactly `overlap` tokens.
pub struct TextChunker {
    tokenizer: Box<dyn TextTokenizer>,
    chunk_size: usize,
    overlap: usize,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Create a chunker; fails if `overlap >= chunk_size`.
    pub fn new(
        tokenizer: Box<dyn TextTokenizer>,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            tokenizer,
            chunk_size,
            overlap,
        })
    }

    /// Build a chunker from configuration.
    ///
    /// With the model tokenizer selected, `model` names the HuggingFace
    /// repository to fetch it from unless a local file is configured.
    pub fn from_config(config: &ChunkingConfig, model: &str) -> Result<Self, ChunkError> {
        let tokenizer: Box<dyn TextTokenizer> = match (config.tokenizer, &config.tokenizer_path) {
            (TokenizerKind::Whitespace, _) => Box::new(WhitespaceTokenizer::new()),
            (TokenizerKind::Model, Some(path)) => Box::new(HfTokenizer::from_file(path)?),
            (TokenizerKind::Model, None) => Box::new(HfTokenizer::from_pretrained(model)?),
        };
        Self::new(
            tokenizer,
            config.chunk_size as usize,
            config.chunk_overlap as usize,
        )
    }

    /// Split `text` into ordered chunks.
    ///
    /// Empty (or whitespace-only) input yields no chunks. Input of at most
    /// `chunk_size` tokens yields one chunk equal to the whole text.
    pub fn split(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        let spans = self.tokenizer.token_spans(text)?;

        if spans.is_empty() {
            return Ok(Vec::new());
        }

        if spans.len() <= self.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        Ok(window_ranges(spans.len(), self.chunk_size, self.overlap)
            .into_iter()
            .map(|window| {
                let start = spans[window.start].start;
                let end = spans[window.end - 1].end;
                text[start..end].to_string()
            })
            .collect())
    }
}

/// Token index windows of `size` tokens advancing by `size - overlap`.
///
/// The final window ends at `total`; it may be shorter than `size`.
fn window_ranges(total: usize, size: usize, overlap: usize) -> Vec<Range<usize>> {
    let step = size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + size).min(total);
        windows.push(start..end);
        if end >= total {
            break;
        }
        start += step;
    }

    windows
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(Box::new(WhitespaceTokenizer::new()), size, overlap).unwrap()
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_input() {
        let chunker = chunker(10, 2);
        assert!(chunker.split("").unwrap().is_empty());
        assert!(chunker.split("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_verbatim_chunk() {
        let chunker = chunker(10, 2);
        let text = "  Hello,\n world!  ";
        let chunks = chunker.split(text).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_exactly_chunk_size_tokens() {
        let chunker = chunker(5, 1);
        let chunks = chunker.split(&numbered_words(5)).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_size() {
        let result = TextChunker::new(Box::new(WhitespaceTokenizer::new()), 10, 10);
        assert!(matches!(result, Err(ChunkError::InvalidConfig(_))));
        let result = TextChunker::new(Box::new(WhitespaceTokenizer::new()), 0, 0);
        assert!(matches!(result, Err(ChunkError::InvalidConfig(_))));
    }

    #[test]
    fn test_600_tokens_at_512_with_50_overlap() {
        let chunker = chunker(512, 50);
        let chunks = chunker.split(&numbered_words(600)).unwrap();
        assert_eq!(chunks.len(), 2);

        let first: Vec<&str> = chunks[0].split_whitespace().collect();
        let second: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(first.len(), 512);
        assert_eq!(second.len(), 138);
        assert_eq!(first[462..], second[..50]);
        assert_eq!(second.last(), Some(&"w599"));
    }

    #[test]
    fn test_adjacent_chunks_share_overlap_and_reconstruct() {
        let (size, overlap) = (7, 3);
        let chunker = chunker(size, overlap);
        let text = numbered_words(40);
        let chunks = chunker.split(&text).unwrap();

        let tokens: Vec<Vec<&str>> = chunks
            .iter()
            .map(|c| c.split_whitespace().collect())
            .collect();

        for pair in tokens.windows(2) {
            assert_eq!(pair[0][size - overlap..], pair[1][..overlap]);
        }

        let mut rebuilt: Vec<&str> = tokens[0].clone();
        for chunk in &tokens[1..] {
            rebuilt.extend_from_slice(&chunk[overlap..]);
        }
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_chunks_are_source_slices() {
        let chunker = chunker(3, 1);
        let text = "alpha  beta\ngamma delta\n\nepsilon zeta";
        for chunk in chunker.split(text).unwrap() {
            assert!(text.contains(&chunk));
            assert!(!chunk.starts_with(char::is_whitespace));
        }
    }

    #[test]
    fn test_split_is_restartable() {
        let chunker = chunker(4, 1);
        let text = numbered_words(13);
        assert_eq!(chunker.split(&text).unwrap(), chunker.split(&text).unwrap());
    }

    #[test]
    fn test_window_ranges() {
        assert_eq!(window_ranges(10, 4, 1), vec![0..4, 3..7, 6..10]);
        assert_eq!(window_ranges(11, 4, 1), vec![0..4, 3..7, 6..10, 9..11]);
    }

    #[test]
    fn test_char_boundaries() {
        let text = "aé";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(ceil_char_boundary(text, 2), 3);
    }

    /// Word-level model: each word or punctuation run is one token.
    fn word_level_tokenizer(dir: &tempfile::TempDir) -> HfTokenizer {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[UNK]": 0, "héllo": 1, "wörld": 2 },
                "unk_token": "[UNK]"
            }
        });
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, json.to_string()).unwrap();
        HfTokenizer::from_file(&path).unwrap()
    }

    fn accented_words(n: usize) -> String {
        const WORDS: [&str; 6] = ["héllo", "wörld", "ça", "naïve", "über", "ñandú"];
        (0..n)
            .map(|i| WORDS[i % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_model_tokenizer_spans_follow_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(&dir);
        let text = "héllo, wörld! ñandú";

        let tokens: Vec<&str> = tokenizer
            .token_spans(text)
            .unwrap()
            .into_iter()
            .map(|span| &text[span])
            .collect();
        assert_eq!(tokens, vec!["héllo", ",", "wörld", "!", "ñandú"]);
    }

    #[test]
    fn test_model_tokenizer_chunks_share_overlap_on_multibyte_text() {
        let dir = tempfile::tempdir().unwrap();
        let (size, overlap) = (8, 3);
        let chunker =
            TextChunker::new(Box::new(word_level_tokenizer(&dir)), size, overlap).unwrap();
        let text = accented_words(30);
        let chunks = chunker.split(&text).unwrap();
        assert_eq!(chunks.len(), 6);

        let retokenizer = word_level_tokenizer(&dir);
        let mut tokens: Vec<Vec<String>> = Vec::new();
        for chunk in &chunks {
            assert!(text.contains(chunk.as_str()));
            let spans = retokenizer.token_spans(chunk).unwrap();
            tokens.push(spans.into_iter().map(|s| chunk[s].to_string()).collect());
        }

        for pair in tokens.windows(2) {
            assert_eq!(pair[0].len(), size);
            assert_eq!(pair[0][size - overlap..], pair[1][..overlap]);
        }

        let mut rebuilt = tokens[0].clone();
        for chunk in &tokens[1..] {
            rebuilt.extend_from_slice(&chunk[overlap..]);
        }
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_model_tokenizer_short_text_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let chunker = TextChunker::new(Box::new(word_level_tokenizer(&dir)), 8, 3).unwrap();
        let text = " héllo, wörld! ";
        assert_eq!(chunker.split(text).unwrap(), vec![text.to_string()]);
    }

    #[test]
    fn test_from_config_selects_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        word_level_tokenizer(&dir);

        let config = ChunkingConfig {
            chunk_size: 2,
            chunk_overlap: 0,
            tokenizer: TokenizerKind::Model,
            tokenizer_path: Some(dir.path().join("tokenizer.json")),
            ..Default::default()
        };
        let chunker = TextChunker::from_config(&config, "unused/model").unwrap();
        // Punctuation is its own token under the model tokenizer.
        let chunks = chunker.split("héllo, wörld").unwrap();
        assert_eq!(chunks, vec!["héllo,", "wörld"]);

        let config = ChunkingConfig {
            tokenizer: TokenizerKind::Whitespace,
            ..config
        };
        let chunker = TextChunker::from_config(&config, "unused/model").unwrap();
        assert_eq!(chunker.split("héllo, wörld").unwrap(), vec!["héllo, wörld"]);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = HfTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"));
        assert!(matches!(result, Err(ChunkError::TokenizerLoad(_))));
    }
}
