//! Capability seams for the delegated intelligence: embedding and answer
//! synthesis are behind object-safe async traits so the orchestration can
//! run against deterministic stand-ins in tests while the real hosted
//! services plug in as adapters.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// Maps text to embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed a batch of texts, returning one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// Synthesizes a single answer from retrieved context chunks and a
/// question ("stuff" aggregation: one model call over everything).
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, context_chunks: &[String], question: &str) -> Result<String>;
}
