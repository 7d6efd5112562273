//! Recursive character text splitter.
//!
//! Splits on the coarsest separator present (paragraphs, lines, words, then
//! characters), then merges neighbouring pieces back into chunks of at most
//! `chunk_size` characters with up to `chunk_overlap` characters carried over.

use crate::error::{FinqueryError, Result};
use std::collections::VecDeque;

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Character-count based recursive splitter.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(FinqueryError::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(FinqueryError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        let joined = |current: &VecDeque<&str>| -> Option<String> {
            let text = current.iter().copied().collect::<Vec<_>>().join(separator);
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = joined(&current) {
                    chunks.push(chunk);
                }

                // Drop from the front until what remains fits as overlap
                loop {
                    let joiner = if current.is_empty() { 0 } else { separator_len };
                    let too_big = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !too_big {
                        break;
                    }
                    let Some(first) = current.front() else { break };
                    let removed = char_len(first) + if current.len() > 1 { separator_len } else { 0 };
                    total = total.saturating_sub(removed);
                    current.pop_front();
                }
            }

            total += len + if current.is_empty() { 0 } else { separator_len };
            current.push_back(piece);
        }

        if let Some(chunk) = joined(&current) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Replace NUL bytes (common in extracted PDF text) and trim.
pub fn clean_text(text: &str) -> String {
    text.replace('\0', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = TextSplitter::new(50, 10).unwrap();
        let chunks = splitter.split_text(&words(200));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 50, "chunk too long: {:?}", chunk);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = TextSplitter::new(50, 10).unwrap();
        let chunks = splitter.split_text(&words(100));
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "{:?} does not continue {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_paragraphs_are_kept_together() {
        let splitter = TextSplitter::new(400, 80).unwrap();
        let text = "First paragraph.\n\nSecond paragraph.";
        assert_eq!(splitter.split_text(text), vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn test_long_word_is_split_by_characters() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text(&"x".repeat(25));
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
    }

    #[test]
    fn test_clean_text_removes_nul() {
        assert_eq!(clean_text("  a\0b \n"), "a b");
        assert!(TextSplitter::new(10, 2).unwrap().split_text("   \n\n  ").is_empty());
    }
}
