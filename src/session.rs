use anyhow::{Context, Result};
use log::info;
use std::io::Write;
use std::path::Path;

use crate::document::{read_document_content, Document};
use crate::engine::{QueryEngine, NO_INDEX_MESSAGE};

/// One question/answer pair in the chat transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// A document handed over as raw bytes (e.g. from a file-upload control)
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Builds a query engine bound to a credential. Swappable so the session
/// transitions stay testable without the hosted services.
pub type EngineFactory = Box<dyn Fn(&str) -> QueryEngine + Send + Sync>;

/// Session-level state: the active credential, the engine owning the
/// current index, and the chat transcript.
///
/// Holds no ambient globals; every UI interaction goes through one of the
/// `on_*` handlers, which apply the documented transitions:
/// - credential changed: transcript and index discarded, fresh engine
/// - new files or folder ingested: index rebuilt from the full new batch,
///   transcript cleared
/// - question asked without an index: sentinel answer, turn still recorded
pub struct Session {
    api_key: String,
    engine: Option<QueryEngine>,
    transcript: Vec<ConversationTurn>,
    factory: EngineFactory,
}

impl Session {
    /// Create a session with no credential and no engine
    pub fn new(factory: EngineFactory) -> Self {
        Session {
            api_key: String::new(),
            engine: None,
            transcript: Vec::new(),
            factory,
        }
    }

    /// Create a session whose engines talk to OpenAI
    pub fn with_openai() -> Self {
        Self::new(Box::new(QueryEngine::from_credential))
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn has_index(&self) -> bool {
        self.engine.as_ref().map(QueryEngine::has_index).unwrap_or(false)
    }

    /// The running chat transcript, oldest turn first
    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Replace the credential. Discards the transcript and the index and
    /// binds a fresh engine to the new key. Empty or unchanged input is a
    /// no-op.
    pub fn on_credential_change(&mut self, api_key: &str) {
        if api_key.is_empty() || api_key == self.api_key {
            return;
        }
        info!("Credential replaced; resetting session state");
        self.api_key = api_key.to_string();
        self.transcript.clear();
        self.engine = Some((self.factory)(api_key));
    }

    /// Ingest all PDF files from a folder as one batch.
    ///
    /// The caller-facing validation lives here: the path must be an
    /// existing directory.
    pub async fn on_ingest(&mut self, folder: &Path) -> Result<()> {
        anyhow::ensure!(
            folder.is_dir(),
            "Not a readable folder: {}",
            folder.display()
        );
        let engine = self.engine_mut()?;
        engine.forget();
        engine.ingest_folder(folder).await?;
        self.transcript.clear();
        Ok(())
    }

    /// Ingest a batch of uploaded files, rebuilding the index from the
    /// full new set.
    ///
    /// Each upload is staged as a scoped temporary file that is removed
    /// when it goes out of scope, whether or not extraction succeeds.
    pub async fn on_files_uploaded(&mut self, files: &[UploadedFile]) -> Result<()> {
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            documents.push(stage_and_extract(file)?);
        }

        let engine = self.engine_mut()?;
        engine.forget();
        engine.ingest_documents(documents).await?;
        self.transcript.clear();
        Ok(())
    }

    /// Answer a question and record the turn.
    ///
    /// Asking before any ingestion (or after `forget`) yields the fixed
    /// sentinel answer; the turn is recorded either way.
    pub async fn on_ask(&mut self, question: &str) -> Result<String> {
        let answer = match &self.engine {
            Some(engine) => engine.ask(question).await?,
            None => NO_INDEX_MESSAGE.to_string(),
        };

        self.transcript.push(ConversationTurn {
            question: question.to_string(),
            answer: answer.clone(),
        });

        Ok(answer)
    }

    /// Drop the index, returning the engine to the not-ingested state
    pub fn forget(&mut self) {
        if let Some(engine) = &mut self.engine {
            engine.forget();
        }
    }

    fn engine_mut(&mut self) -> Result<&mut QueryEngine> {
        self.engine
            .as_mut()
            .context("No API credential set; provide one before ingesting")
    }
}

/// Write the upload to a temp file, extract its text, and let the staged
/// copy clean itself up on drop.
fn stage_and_extract(file: &UploadedFile) -> Result<Document> {
    let mime_type = mime_guess::from_path(&file.name)
        .first_or_octet_stream()
        .to_string();

    let mut staged = tempfile::NamedTempFile::new()
        .with_context(|| format!("Failed to stage upload {}", file.name))?;
    staged
        .write_all(&file.bytes)
        .with_context(|| format!("Failed to write staged upload {}", file.name))?;

    let content = read_document_content(staged.path(), &mime_type)
        .with_context(|| format!("Failed to extract text from upload {}", file.name))?;

    Ok(Document {
        content,
        document_id: file.name.clone(),
        mime_type,
    })
}
