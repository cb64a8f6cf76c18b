//! Domain types shared by the loader, chunker, vector index and orchestrator.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ChunkId = String;

/// Where a piece of text came from.
///
/// - `source_path`: path of the originating PDF, never empty
/// - `page_number`: 1-based page, when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source_path: String,
    pub page_number: Option<u32>,
}

impl SourceMeta {
    /// Basename of `source_path`, used for citations.
    pub fn file_name(&self) -> Option<String> {
        Path::new(&self.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
    }
}

/// One page of text as it came out of a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub text: String,
    pub metadata: SourceMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    #[serde(flatten)]
    pub source: SourceMeta,
    /// Character offset of the chunk inside its page text.
    pub start_offset: usize,
}

/// A window of page text that is embedded and indexed independently.
///
/// `id` is `<file stem>:<ordinal>` and is unique within one index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMeta,
}

impl Chunk {
    pub fn source_path(&self) -> &str {
        &self.metadata.source.source_path
    }

    pub fn file_name(&self) -> Option<String> {
        self.metadata.source.file_name()
    }

    pub fn page_number(&self) -> Option<u32> {
        self.metadata.source.page_number
    }
}

/// A search hit. `score` is cosine similarity, higher is better; `ordinal` is
/// the chunk's insertion position in the index and breaks score ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub ordinal: u32,
}

/// The outcome of one question, before it is flattened into text.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub answer_text: String,
    pub source_chunks: Vec<Chunk>,
}
