use crate::error::{IngestError, Result};
use crate::models::Chunk;

/// Break preferences, strongest first. A window is cut at the latest
/// occurrence of the strongest separator it contains; a window with none
/// of them is cut at the size limit.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits extracted text into overlapping windows of at most `chunk_size`
/// characters. Consecutive chunks share `overlap` characters so that a
/// sentence straddling a boundary stays queryable from both sides.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(IngestError::InvalidChunkConfig(
            "chunk size must be positive".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(IngestError::InvalidChunkConfig(format!(
            "overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }

    // Byte offsets of every char boundary, so slicing stays valid UTF-8
    // while window arithmetic happens in character units.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total_chars {
        let hard_end = (start + chunk_size).min(total_chars);
        let end = if hard_end < total_chars {
            break_point(text, &boundaries, start, hard_end, overlap)
        } else {
            hard_end
        };

        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                text: window.to_string(),
            });
        }

        if end == total_chars {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Picks the cut position for a full window, in char units. Falls back to
/// the hard limit when no separator lands far enough in to keep the scan
/// moving forward.
fn break_point(
    text: &str,
    boundaries: &[usize],
    start: usize,
    hard_end: usize,
    overlap: usize,
) -> usize {
    let window = &text[boundaries[start]..boundaries[hard_end]];

    for separator in SEPARATORS {
        if let Some(byte_pos) = window.rfind(separator) {
            let cut_byte = boundaries[start] + byte_pos + separator.len();
            let cut = boundaries.partition_point(|&offset| offset < cut_byte);
            if cut > start + overlap {
                return cut;
            }
        }
    }

    hard_end
}
