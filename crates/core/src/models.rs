use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File formats the reader knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Text,
    Markdown,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Text),
            "md" => Some(FileKind::Markdown),
            _ => None,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            FileKind::Pdf => ContentType::PdfBase64,
            _ => ContentType::Text,
        }
    }
}

/// How the `content` field of an indexed document is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "pdf_base64")]
    PdfBase64,
    #[serde(rename = "text")]
    Text,
}

/// A candidate file discovered under the scan root. Immutable for the run.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    pub file_name: String,
    /// Parent directory relative to the scan root ("" for top-level files).
    pub relative_path: String,
    pub kind: FileKind,
    /// Modification time in whole seconds since the epoch.
    pub modified_epoch: i64,
}

/// Result of reading one file: extracted text or a reason it was skipped.
#[derive(Debug)]
pub enum FileOutcome {
    Extracted(ExtractedFile),
    Skipped(SkippedFile),
}

#[derive(Debug)]
pub struct ExtractedFile {
    pub source: SourceFile,
    /// Plain text fed to the chunker.
    pub text: String,
    /// Full content stored verbatim on every chunk document
    /// (base64 for PDFs, the text itself otherwise).
    pub stored_content: String,
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension(String),
    EncryptedPdf,
    Unreadable(String),
    EmptyText,
    NoChunks,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedExtension(ext) => write!(f, "unsupported extension: {ext}"),
            SkipReason::EncryptedPdf => write!(f, "encrypted pdf (password needed)"),
            SkipReason::Unreadable(details) => write!(f, "unreadable: {details}"),
            SkipReason::EmptyText => write!(f, "no extractable text"),
            SkipReason::NoChunks => write!(f, "text produced zero chunks"),
        }
    }
}

/// A contiguous window of extracted text, positioned within its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Source fields of one indexed chunk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub file_name: String,
    pub path: String,
    pub content: String,
    pub content_type: ContentType,
    pub chunk_text: String,
    pub chunk_vector: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// One unit of work for the bulk write API. The document id is derived
/// deterministically from path, modification time, and chunk index so
/// re-runs over an unchanged folder overwrite instead of duplicating.
#[derive(Debug, Clone)]
pub struct IndexAction {
    pub document_id: String,
    pub document: ChunkDocument,
}

/// Per-item accounting for one bulk request.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub first_failure: Option<String>,
}

/// Counters accumulated by the batch indexer over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub actions_submitted: usize,
    pub docs_indexed: usize,
    pub docs_rejected: usize,
    pub batches_flushed: usize,
    pub batches_dropped: usize,
}

/// End-of-run summary returned by the ingestion pipeline.
#[derive(Debug)]
pub struct IngestionReport {
    pub files_processed: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub chunks_embedded: usize,
    pub chunks_dropped: usize,
    pub stats: IndexingStats,
}

/// Listing entry served by `GET /api/files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub file_name: String,
    pub path: String,
}
