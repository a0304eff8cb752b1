use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use crate::chunking;
use crate::document::Document;
use crate::index::{ChunkIndex, Retriever};
use crate::openai::{OpenAiClient, OpenAiConfig};
use crate::provider::{Answerer, Embedder};

/// Fixed response for questions asked before any document was ingested.
/// A normal answer, not a failure.
pub const NO_INDEX_MESSAGE: &str = "Please, add a document.";

/// How many chunks to hand the answerer per question
const DEFAULT_TOP_K: usize = 4;

/// Retrieval-augmented query engine: ingest documents into an in-memory
/// index, answer questions from the most relevant chunks.
///
/// Every ingest call replaces the index wholesale; there is no
/// incremental update. `forget` returns the engine to the not-ingested
/// state.
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn Answerer>,
    index: Option<Box<dyn Retriever>>,
}

impl QueryEngine {
    /// Create an engine over arbitrary embedding and answering backends
    pub fn new(embedder: Arc<dyn Embedder>, answerer: Arc<dyn Answerer>) -> Self {
        QueryEngine {
            embedder,
            answerer,
            index: None,
        }
    }

    /// Create an engine bound to an OpenAI credential
    pub fn from_credential(api_key: &str) -> Self {
        let client = Arc::new(OpenAiClient::new(OpenAiConfig::new(api_key)));
        Self::new(client.clone(), client)
    }

    /// Whether an index currently exists
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Ingest every PDF file in a folder as one batch.
    ///
    /// Files without a `.pdf` extension are silently skipped. A missing
    /// or unreadable folder is an error.
    pub async fn ingest_folder(&mut self, folder: &Path) -> Result<()> {
        let mut pdf_paths = Vec::new();
        for entry in std::fs::read_dir(folder)
            .with_context(|| format!("Failed to read folder: {}", folder.display()))?
        {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if is_pdf {
                pdf_paths.push(path);
            } else {
                debug!("Skipping non-PDF entry: {}", path.display());
            }
        }
        pdf_paths.sort();

        let mut documents = Vec::new();
        for path in &pdf_paths {
            documents.push(Document::from_file(path)?);
        }

        info!(
            "Ingesting {} PDF document(s) from {}",
            documents.len(),
            folder.display()
        );
        self.ingest_documents(documents).await
    }

    /// Ingest a single file (PDF, XLSX, or plain text)
    pub async fn ingest_file(&mut self, path: &Path) -> Result<()> {
        let document = Document::from_file(path)?;
        self.ingest_documents(vec![document]).await
    }

    /// Ingest an already-extracted text blob
    pub async fn ingest_text(&mut self, text: &str) -> Result<()> {
        self.ingest_documents(vec![Document::from_text("inline", text)])
            .await
    }

    /// Ingest a batch of documents, replacing any existing index with a
    /// fresh one built from the full batch.
    pub async fn ingest_documents(&mut self, documents: Vec<Document>) -> Result<()> {
        let combined = documents
            .iter()
            .map(|d| d.content.as_str())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = chunking::split_into_chunks(&combined);
        info!("Split batch into {} chunk(s)", chunks.len());

        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            self.embedder
                .embed_batch(&texts)
                .await
                .context("Failed to embed chunks")?
        };

        self.index = Some(Box::new(ChunkIndex::new(chunks, embeddings)));
        Ok(())
    }

    /// Answer a question from the current index.
    ///
    /// Without an index this returns [`NO_INDEX_MESSAGE`]; otherwise the
    /// top-ranked chunks and the question go to the answerer in a single
    /// call. Downstream service failures propagate unchanged.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let index = match &self.index {
            Some(index) => index,
            None => return Ok(NO_INDEX_MESSAGE.to_string()),
        };

        let question_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        let chunks = index.retrieve(&question_embedding, DEFAULT_TOP_K);
        debug!("Retrieved {} chunk(s) for question", chunks.len());

        let context_chunks: Vec<String> = chunks.into_iter().map(|c| c.text).collect();

        self.answerer
            .answer(&context_chunks, question)
            .await
            .context("Failed to generate answer")
    }

    /// Drop the index, returning to the not-ingested state. Idempotent.
    pub fn forget(&mut self) {
        self.index = None;
    }
}
