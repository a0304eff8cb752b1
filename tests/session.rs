//! Session-level behavior: handler transitions, transcript lifecycle,
//! upload staging, and retrieval over deterministic stub providers.

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;

use docquery::engine::{QueryEngine, NO_INDEX_MESSAGE};
use docquery::provider::{Answerer, Embedder, Embedding};
use docquery::session::{EngineFactory, Session, UploadedFile};

/// Letter-frequency embedder: deterministic, vocabulary-sensitive.
struct FrequencyEmbedder;

fn frequency_vector(text: &str) -> Embedding {
    let mut values = vec![0.0f32; 26];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        values[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    Embedding { values }
}

#[async_trait]
impl Embedder for FrequencyEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(frequency_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| frequency_vector(t)).collect())
    }
}

/// Echoes the retrieved context so assertions can see what was retrieved
struct EchoAnswerer;

#[async_trait]
impl Answerer for EchoAnswerer {
    async fn answer(&self, context_chunks: &[String], question: &str) -> Result<String> {
        Ok(format!("[{}] {}", question, context_chunks.join(" | ")))
    }
}

fn stub_factory() -> EngineFactory {
    Box::new(|_key| QueryEngine::new(Arc::new(FrequencyEmbedder), Arc::new(EchoAnswerer)))
}

fn stub_session() -> Session {
    let mut session = Session::new(stub_factory());
    session.on_credential_change("test-key");
    session
}

/// Minimal XLSX with shared strings in A1/B1 and a null B2
fn fixture_xlsx(values: &[&str]) -> Vec<u8> {
    let mut shared = String::from(
        "<?xml version=\"1.0\"?><sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
    );
    for v in values {
        shared.push_str(&format!("<si><t>{}</t></si>", v));
    }
    shared.push_str("</sst>");

    let mut rows = String::new();
    for (i, _) in values.iter().enumerate() {
        rows.push_str(&format!(
            "<row r=\"{r}\"><c r=\"A{r}\" t=\"s\"><v>{i}</v></c><c r=\"B{r}\"/></row>",
            r = i + 1,
            i = i
        ));
    }
    let sheet = format!(
        "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
        rows
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("xl/sharedStrings.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(shared.as_bytes()).unwrap();
        zip.start_file(
            "xl/worksheets/sheet1.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn ask_before_any_ingest_returns_sentinel_and_records_turn() {
    let mut session = stub_session();

    let answer = session.on_ask("what is in the report?").await.unwrap();
    assert_eq!(answer, NO_INDEX_MESSAGE);

    let answer = session.on_ask("").await.unwrap();
    assert_eq!(answer, NO_INDEX_MESSAGE);

    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[0].question, "what is in the report?");
    assert_eq!(session.transcript()[0].answer, NO_INDEX_MESSAGE);
}

#[tokio::test]
async fn ask_without_credential_returns_sentinel() {
    let mut session = Session::new(stub_factory());
    assert!(!session.has_credential());

    let answer = session.on_ask("hello?").await.unwrap();
    assert_eq!(answer, NO_INDEX_MESSAGE);
    assert_eq!(session.transcript().len(), 1);
}

#[tokio::test]
async fn forget_after_ingest_restores_sentinel() {
    let mut session = stub_session();
    let upload = UploadedFile {
        name: "one.xlsx".to_string(),
        bytes: fixture_xlsx(&["alpha", "beta"]),
    };
    session.on_files_uploaded(&[upload]).await.unwrap();
    assert!(session.has_index());

    session.forget();
    assert!(!session.has_index());
    assert_eq!(session.on_ask("alpha?").await.unwrap(), NO_INDEX_MESSAGE);
}

#[tokio::test]
async fn xlsx_upload_flattens_cells_and_skips_nulls() {
    let mut session = stub_session();
    let upload = UploadedFile {
        name: "sheet.xlsx".to_string(),
        bytes: fixture_xlsx(&["revenue", "expenses", "margin"]),
    };
    session.on_files_uploaded(&[upload]).await.unwrap();

    let answer = session.on_ask("revenue").await.unwrap();
    // all non-null values present, flattened in row-major order
    assert!(answer.contains("revenue\nexpenses\nmargin"));
}

#[tokio::test]
async fn reupload_discards_previous_documents() {
    let mut session = stub_session();

    session
        .on_files_uploaded(&[UploadedFile {
            name: "old.xlsx".to_string(),
            bytes: fixture_xlsx(&["zzzz", "zzzz"]),
        }])
        .await
        .unwrap();
    let first = session.on_ask("zzzz").await.unwrap();
    assert!(first.contains("zzzz"));

    session
        .on_files_uploaded(&[UploadedFile {
            name: "new.xlsx".to_string(),
            bytes: fixture_xlsx(&["qqqq", "qqqq"]),
        }])
        .await
        .unwrap();

    // query aimed at the old corpus can only surface the new one
    let second = session.on_ask("zzzz").await.unwrap();
    assert!(!second.contains("zzzz\n"));
    assert!(second.contains("qqqq"));
}

#[tokio::test]
async fn upload_clears_transcript() {
    let mut session = stub_session();
    session.on_ask("first question").await.unwrap();
    assert_eq!(session.transcript().len(), 1);

    session
        .on_files_uploaded(&[UploadedFile {
            name: "doc.xlsx".to_string(),
            bytes: fixture_xlsx(&["content"]),
        }])
        .await
        .unwrap();

    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn credential_change_clears_transcript_and_index() {
    let mut session = stub_session();
    session
        .on_files_uploaded(&[UploadedFile {
            name: "doc.xlsx".to_string(),
            bytes: fixture_xlsx(&["content"]),
        }])
        .await
        .unwrap();
    session.on_ask("one").await.unwrap();
    session.on_ask("two").await.unwrap();
    assert_eq!(session.transcript().len(), 2);

    session.on_credential_change("another-key");

    assert!(session.transcript().is_empty());
    assert!(!session.has_index());
    assert_eq!(session.on_ask("one").await.unwrap(), NO_INDEX_MESSAGE);
}

#[tokio::test]
async fn unchanged_or_empty_credential_is_a_noop() {
    let mut session = stub_session();
    session.on_ask("q").await.unwrap();

    session.on_credential_change("test-key");
    assert_eq!(session.transcript().len(), 1);

    session.on_credential_change("");
    assert_eq!(session.transcript().len(), 1);
    assert!(session.has_credential());
}

#[tokio::test]
async fn corrupt_upload_errors_and_keeps_previous_index() {
    let mut session = stub_session();
    session
        .on_files_uploaded(&[UploadedFile {
            name: "good.xlsx".to_string(),
            bytes: fixture_xlsx(&["kept"]),
        }])
        .await
        .unwrap();

    let result = session
        .on_files_uploaded(&[UploadedFile {
            name: "bad.xlsx".to_string(),
            bytes: b"not a zip archive".to_vec(),
        }])
        .await;
    assert!(result.is_err());

    // staging failed before the reset, so the old index still answers
    assert!(session.has_index());
    let answer = session.on_ask("kept").await.unwrap();
    assert!(answer.contains("kept"));
}

#[tokio::test]
async fn folder_ingest_requires_existing_directory() {
    let mut session = stub_session();
    let missing = std::path::Path::new("/no/such/folder");
    assert!(session.on_ingest(missing).await.is_err());
}

#[tokio::test]
async fn folder_ingest_clears_transcript() {
    let dir = tempfile::tempdir().unwrap();

    let mut session = stub_session();
    session.on_ask("stale question").await.unwrap();

    session.on_ingest(dir.path()).await.unwrap();
    assert!(session.transcript().is_empty());
    assert!(session.has_index());
}
