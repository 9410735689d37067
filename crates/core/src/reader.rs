use crate::models::{
    ExtractedFile, FileKind, FileOutcome, SkipReason, SkippedFile, SourceFile,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;
use walkdir::WalkDir;

/// Maximum decompressed bytes accepted from the docx body entry.
const MAX_DOCX_XML_BYTES: u64 = 50 * 1024 * 1024;

pub fn discover_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Walks `root` recursively and yields one outcome per candidate file.
/// Paths are enumerated up front; the extraction itself happens lazily as
/// the iterator is driven, so only one file's content is in memory at a
/// time. Nothing in here terminates the run: unreadable or unsupported
/// files come back as [`FileOutcome::Skipped`] with a reason.
pub fn scan_folder(root: &Path) -> impl Iterator<Item = FileOutcome> + '_ {
    discover_files(root)
        .into_iter()
        .map(move |path| read_file(root, &path))
}

pub fn read_file(root: &Path, path: &Path) -> FileOutcome {
    let skipped = |reason: SkipReason| {
        FileOutcome::Skipped(SkippedFile {
            path: path.to_path_buf(),
            reason,
        })
    };

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let kind = match FileKind::from_extension(extension) {
        Some(kind) => kind,
        None => return skipped(SkipReason::UnsupportedExtension(extension.to_string())),
    };

    let source = match source_file(root, path, kind) {
        Ok(source) => source,
        Err(details) => return skipped(SkipReason::Unreadable(details)),
    };

    let (text, stored_content) = match kind {
        FileKind::Pdf => match read_pdf(path) {
            Ok(pair) => pair,
            Err(reason) => return skipped(reason),
        },
        FileKind::Docx => match read_docx(path) {
            Ok(text) => {
                let stored = text.clone();
                (text, stored)
            }
            Err(details) => return skipped(SkipReason::Unreadable(details)),
        },
        FileKind::Text | FileKind::Markdown => match fs::read_to_string(path) {
            Ok(text) => {
                let stored = text.clone();
                (text, stored)
            }
            Err(error) => return skipped(SkipReason::Unreadable(error.to_string())),
        },
    };

    if text.trim().is_empty() {
        return skipped(SkipReason::EmptyText);
    }

    FileOutcome::Extracted(ExtractedFile {
        source,
        text,
        stored_content,
    })
}

fn source_file(root: &Path, path: &Path, kind: FileKind) -> Result<SourceFile, String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("path missing filename: {}", path.display()))?
        .to_string();

    let relative_path = path
        .strip_prefix(root)
        .ok()
        .and_then(|relative| relative.parent())
        .map(|parent| parent.to_string_lossy().to_string())
        .unwrap_or_default();

    let modified_epoch = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|error| error.to_string())?
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0);

    Ok(SourceFile {
        absolute_path: path.to_path_buf(),
        file_name,
        relative_path,
        kind,
        modified_epoch,
    })
}

/// Extracts page text from a PDF, plus the base64-encoded raw bytes that are
/// stored on every chunk document. Encrypted files are opened with the empty
/// password; a failed decrypt skips the file. A page that fails extraction is
/// warned about and dropped while the remaining pages are kept.
fn read_pdf(path: &Path) -> Result<(String, String), SkipReason> {
    let bytes = fs::read(path).map_err(|error| SkipReason::Unreadable(error.to_string()))?;
    let stored_content = STANDARD.encode(&bytes);

    let mut document =
        Document::load_mem(&bytes).map_err(|error| SkipReason::Unreadable(error.to_string()))?;

    if document.is_encrypted() && document.decrypt("").is_err() {
        return Err(SkipReason::EncryptedPdf);
    }

    let mut text = String::new();
    for (page_no, _page_id) in document.get_pages() {
        match document.extract_text(&[page_no]) {
            Ok(page_text) => {
                if !page_text.trim().is_empty() {
                    text.push_str(&page_text);
                    text.push('\n');
                }
            }
            Err(error) => {
                warn!(path = %path.display(), page = page_no, %error, "page extraction failed");
            }
        }
    }

    Ok((text, stored_content))
}

/// Reads `word/document.xml` out of the docx archive and joins paragraph
/// runs with newlines.
fn read_docx(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|error| error.to_string())?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|error| error.to_string())?;

    let mut document_xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| error.to_string())?
        .take(MAX_DOCX_XML_BYTES)
        .read_to_end(&mut document_xml)
        .map_err(|error| error.to_string())?;
    if document_xml.len() as u64 >= MAX_DOCX_XML_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    paragraphs_from_document_xml(&document_xml)
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);

    let mut out = String::new();
    let mut buf = Vec::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(element)) => {
                if element.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(content)) if in_text_run => {
                out.push_str(content.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(error) => return Err(error.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
