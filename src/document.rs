use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::path::Path;

use crate::spreadsheet;

/// MIME type of an OOXML spreadsheet
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A named source file plus its extracted plain-text content.
///
/// Lives only for the duration of an ingestion call; once split into
/// chunks the document itself is discarded.
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name
    pub document_id: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .context("Invalid file name")?
            .to_str()
            .context("Invalid file name encoding")?
            .to_string();

        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            document_id: file_name,
            mime_type,
        })
    }

    /// Create a document from an already-extracted text blob
    pub fn from_text(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Document {
            content: content.into(),
            document_id: document_id.into(),
            mime_type: "text/plain".to_string(),
        }
    }
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        MIME_XLSX => {
            info!("Processing XLSX document: {}", path.display());
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read XLSX file: {}", path.display()))?;
            spreadsheet::extract_xlsx(&bytes)
                .with_context(|| format!("Failed to extract cells from XLSX: {}", path.display()))
        }

        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            Ok(content)
        }

        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only PDF, XLSX, and text files are supported.",
            mime_type
        )),
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Collapse runs of newlines to at most a paragraph break
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    if newline_count > 0 {
        if newline_count >= 2 {
            normalized.push_str("\n\n");
        } else {
            normalized.push('\n');
        }
    }

    normalized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }

    #[test]
    fn test_from_text_blob() {
        let doc = Document::from_text("pasted", "cell one\ncell two");
        assert_eq!(doc.document_id, "pasted");
        assert_eq!(doc.content, "cell one\ncell two");
        assert_eq!(doc.mime_type, "text/plain");
    }

    #[test]
    fn test_from_file_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"plain text body").unwrap();

        let doc = Document::from_file(&path).unwrap();
        assert_eq!(doc.document_id, "notes.txt");
        assert_eq!(doc.content, "plain text body");
        assert!(doc.mime_type.starts_with("text/plain"));
    }

    #[test]
    fn test_from_file_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, b"\x89PNG").unwrap();

        assert!(Document::from_file(&path).is_err());
    }
}
