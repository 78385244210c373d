//! Tokenizer-bound chunking.
//!
//! Text is split in *token* space, not character space, using the same
//! cl100k BPE the embedding collaborator encodes with, so a chunk never
//! exceeds what the collaborator will actually accept.

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::config::PipelineConfig;
use crate::types::PipelineError;

/// Splits labeled field text into overlapping token windows.
///
/// The field label is prefixed to the text (`"<label>: <text>"`) before
/// tokenization so every chunk carries its field context in the embedded
/// string. Windows are `max_tokens` long and consecutive windows share
/// `overlap` tokens, so no semantic unit is fully lost at a boundary.
pub struct TokenChunker {
    bpe: CoreBPE,
    max_tokens: usize,
    overlap: usize,
}

impl TokenChunker {
    /// Builds a chunker with the given window budget and overlap.
    ///
    /// The overlap must be strictly smaller than the window, otherwise the
    /// window start would never advance.
    pub fn new(max_tokens: usize, overlap: usize) -> Result<Self, PipelineError> {
        if max_tokens == 0 || overlap >= max_tokens {
            return Err(PipelineError::Chunking(format!(
                "overlap ({overlap}) must be smaller than the window ({max_tokens})"
            )));
        }
        let bpe = cl100k_base().map_err(|err| PipelineError::Chunking(err.to_string()))?;
        Ok(Self {
            bpe,
            max_tokens,
            overlap,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::new(config.max_chunk_tokens, config.chunk_overlap_tokens)
    }

    /// Splits one field's text into chunk strings in window order.
    ///
    /// Empty or whitespace-only text yields no chunks. Windows are decoded
    /// lossily: a boundary that lands inside a multi-byte character leaves a
    /// replacement character at the chunk edge instead of failing, and the
    /// decoded form is used consistently for both storage and embedding.
    pub fn chunk(&self, label: &str, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let prefixed = format!("{label}: {text}");
        let tokens = self.bpe.encode_ordinary(&prefixed);
        if tokens.len() <= self.max_tokens {
            return vec![prefixed];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.max_tokens).min(tokens.len());
            let window = tokens[start..end].to_vec();
            let bytes: Vec<u8> = self.bpe._decode_native_and_split(window).flatten().collect();
            chunks.push(String::from_utf8_lossy(&bytes).into_owned());

            if end >= tokens.len() {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> TokenChunker {
        TokenChunker::new(1000, 50).unwrap()
    }

    #[test]
    fn short_text_yields_single_prefixed_chunk() {
        let chunks = chunker().chunk("Title", "Warm-up drill");
        assert_eq!(chunks, vec!["Title: Warm-up drill".to_string()]);
    }

    #[test]
    fn empty_and_whitespace_text_yield_no_chunks() {
        let chunker = chunker();
        assert!(chunker.chunk("Title", "").is_empty());
        assert!(chunker.chunk("Title", "   \n\t ").is_empty());
    }

    #[test]
    fn long_text_windows_overlap_in_token_space() {
        let chunker = chunker();
        let text = "coaching drills for passing and movement ".repeat(400);
        let chunks = chunker.chunk("Transcription", &text);
        assert!(chunks.len() > 1, "expected multiple windows");

        for (current, next) in chunks.iter().zip(chunks.iter().skip(1)) {
            // The next window begins with the last 50 tokens of this one.
            let tokens = chunker.bpe.encode_ordinary(current);
            let tail = chunker
                .bpe
                .decode(tokens[tokens.len() - 50..].to_vec())
                .unwrap();
            assert!(
                next.starts_with(&tail),
                "window should start with the previous window's 50-token tail"
            );
        }
    }

    #[test]
    fn every_window_fits_the_token_budget() {
        let chunker = chunker();
        let text = "one two three four five six seven eight ".repeat(500);
        let chunks = chunker.chunk("Description", &text);
        for chunk in &chunks {
            assert!(chunker.bpe.encode_ordinary(chunk).len() <= 1000);
        }
    }

    #[test]
    fn final_window_aligns_with_the_end_of_input() {
        let chunker = chunker();
        let text = "shooting practice near the far post ".repeat(400);
        let chunks = chunker.chunk("Transcription", &text);
        let prefixed = format!("Transcription: {text}");
        let last = chunks.last().unwrap();
        assert!(prefixed.ends_with(last.as_str()));
    }

    #[test]
    fn multibyte_text_over_budget_chunks_instead_of_failing() {
        // Each of these exceeds the window in token space, and window
        // boundaries can land inside a multi-byte character.
        let chunker = chunker();
        for text in ["🏒".repeat(1500), "вратарь ".repeat(600), "練習試合".repeat(500)] {
            let chunks = chunker.chunk("Transcription", &text);
            assert!(chunks.len() > 1, "expected multiple windows");
            assert!(chunks[0].starts_with("Transcription: "));
            for chunk in &chunks {
                assert!(!chunk.is_empty());
            }
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(TokenChunker::new(50, 50).is_err());
        assert!(TokenChunker::new(0, 0).is_err());
    }
}
