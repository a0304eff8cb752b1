use log::debug;

use crate::chunking::TextChunk;
use crate::provider::Embedding;

/// Relevance-ranked chunk lookup over an embedding space.
pub trait Retriever: Send + Sync {
    /// Return up to `limit` chunks most relevant to the query embedding,
    /// best first
    fn retrieve(&self, query: &Embedding, limit: usize) -> Vec<TextChunk>;
}

/// In-memory vector index: each chunk stored next to its embedding,
/// searched by brute-force cosine similarity. Owned by one session and
/// replaced wholesale on every ingest; nothing survives process restart.
pub struct ChunkIndex {
    entries: Vec<IndexEntry>,
}

struct IndexEntry {
    chunk: TextChunk,
    embedding: Embedding,
}

impl ChunkIndex {
    /// Build an index from parallel chunk and embedding lists.
    ///
    /// The lists must be the same length; pairing is positional.
    pub fn new(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Self {
        debug_assert_eq!(chunks.len(), embeddings.len());
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect::<Vec<_>>();
        debug!("Built index with {} chunk(s)", entries.len());
        ChunkIndex { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Retriever for ChunkIndex {
    fn retrieve(&self, query: &Embedding, limit: usize) -> Vec<TextChunk> {
        let mut scored: Vec<(f32, &TextChunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(&query.values, &e.embedding.values), &e.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored.into_iter().map(|(_, chunk)| chunk.clone()).collect()
    }
}

/// Cosine similarity between two embedding vectors, in `[-1.0, 1.0]`.
/// Empty or mismatched-length vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
