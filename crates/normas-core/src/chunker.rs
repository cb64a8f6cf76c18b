//! Recursive character splitter.
//!
//! Text is cut at the highest-priority separator present (paragraph, line,
//! sentence, clause, word, character). Pieces that are still too long are split
//! again with the next separator; short pieces are merged back into windows of at
//! most `chunk_size` characters that overlap by at most `chunk_overlap`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMeta, RawDocument};

pub const SEPARATORS: [&str; 6] = ["\n\n", "\n", ".", ",", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Split and pair every chunk with its character offset in `text`.
    pub fn split_with_offsets(&self, text: &str) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        let mut index = 0usize;
        let mut previous_len = 0usize;
        for chunk in self.split_text(text) {
            let from = (index + previous_len).saturating_sub(self.chunk_overlap);
            index = find_from(text, &chunk, from).or_else(|| find_from(text, &chunk, 0)).unwrap_or(0);
            previous_len = char_len(&chunk);
            out.push((chunk, index));
        }
        out
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                final_chunks.extend(self.merge(&short));
                short.clear();
            }
            if remaining.is_empty() {
                push_trimmed(&mut final_chunks, &VecDeque::from([piece]));
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !short.is_empty() {
            final_chunks.extend(self.merge(&short));
        }
        final_chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut docs, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_trimmed(&mut docs, &window);
        docs
    }
}

/// Split page documents into chunks, keeping their source metadata.
///
/// Chunk ids are `<file stem>:<n>` with `n` counting chunks per source file.
pub fn split_documents(documents: &[RawDocument], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap)?;
    if documents.is_empty() {
        warn!("No documents to split");
        return Ok(vec![]);
    }
    info!("Splitting documents into chunks (size={}, overlap={})", chunk_size, chunk_overlap);
    let mut per_file: HashMap<&str, usize> = HashMap::new();
    let mut chunks = Vec::new();
    for doc in documents {
        let source_path = doc.metadata.source_path.as_str();
        let stem = Path::new(source_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| source_path.to_string());
        for (text, start_offset) in splitter.split_with_offsets(&doc.text) {
            let n = per_file.entry(source_path).or_insert(0);
            chunks.push(Chunk {
                id: format!("{}:{}", stem, n),
                text,
                metadata: ChunkMeta { source: doc.metadata.clone(), start_offset },
            });
            *n += 1;
        }
    }
    info!("Split {} pages into {} chunks", documents.len(), chunks.len());
    Ok(chunks)
}

fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_trimmed(docs: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Character index of `needle` in `haystack`, searching from character `from`.
fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = haystack.char_indices().nth(from).map(|(b, _)| b)?;
    let byte_idx = haystack[byte_from..].find(needle)? + byte_from;
    Some(haystack[..byte_idx].chars().count())
}
