use crate::chunker::split_text;
use crate::embedder::TextEmbedder;
use crate::error::Result;
use crate::indexer::BatchIndexer;
use crate::models::{
    ChunkDocument, ExtractedFile, FileOutcome, IndexAction, IngestionReport, SkipReason,
    SkippedFile, SourceFile,
};
use crate::traits::BulkWriter;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub user_id: Option<String>,
}

/// Drives files through extraction, chunking, embedding, and batched
/// indexing, pulling one outcome at a time from the source so a large
/// folder is never held in memory at once. Per-file and per-chunk
/// failures are counted and logged; only a broken chunking configuration
/// aborts the run.
pub async fn run_ingestion<I, E, W>(
    outcomes: I,
    embedder: &E,
    writer: &W,
    options: &PipelineOptions,
) -> Result<IngestionReport>
where
    I: IntoIterator<Item = FileOutcome>,
    E: TextEmbedder + ?Sized,
    W: BulkWriter,
{
    let mut indexer = BatchIndexer::new(writer, options.batch_size);
    let mut skipped_files = Vec::new();
    let mut files_processed = 0usize;
    let mut chunks_embedded = 0usize;
    let mut chunks_dropped = 0usize;

    for outcome in outcomes {
        let extracted = match outcome {
            FileOutcome::Extracted(extracted) => extracted,
            FileOutcome::Skipped(skipped) => {
                skipped_files.push(skipped);
                continue;
            }
        };

        let chunks = split_text(&extracted.text, options.chunk_size, options.chunk_overlap)?;
        if chunks.is_empty() {
            skipped_files.push(SkippedFile {
                path: extracted.source.absolute_path.clone(),
                reason: SkipReason::NoChunks,
            });
            continue;
        }

        let mut file_chunks = 0usize;
        for chunk in &chunks {
            // One chunk at a time: an embedding failure drops that chunk
            // and the rest of the file keeps going.
            let vector = match embedder.embed(vec![chunk.text.clone()]).await {
                Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
                Ok(_) => {
                    warn!(
                        file = %extracted.source.file_name,
                        chunk = chunk.index,
                        "embedder returned no vector, dropping chunk"
                    );
                    chunks_dropped += 1;
                    continue;
                }
                Err(error) => {
                    warn!(
                        file = %extracted.source.file_name,
                        chunk = chunk.index,
                        %error,
                        "embedding failed, dropping chunk"
                    );
                    chunks_dropped += 1;
                    continue;
                }
            };

            if vector.len() != embedder.dimensions() {
                warn!(
                    file = %extracted.source.file_name,
                    chunk = chunk.index,
                    got = vector.len(),
                    expected = embedder.dimensions(),
                    "dropping chunk with wrong vector width"
                );
                chunks_dropped += 1;
                continue;
            }

            indexer
                .push(IndexAction {
                    document_id: chunk_document_id(&extracted.source, chunk.index),
                    document: chunk_document(&extracted, &chunk.text, vector, options),
                })
                .await;
            file_chunks += 1;
        }

        chunks_embedded += file_chunks;
        files_processed += 1;
        info!(
            file = %extracted.source.file_name,
            chunks = file_chunks,
            "file queued for indexing"
        );
    }

    let stats = indexer.finish().await;
    Ok(IngestionReport {
        files_processed,
        skipped_files,
        chunks_embedded,
        chunks_dropped,
        stats,
    })
}

fn chunk_document(
    extracted: &ExtractedFile,
    chunk_text: &str,
    vector: Vec<f32>,
    options: &PipelineOptions,
) -> ChunkDocument {
    ChunkDocument {
        file_name: extracted.source.file_name.clone(),
        path: extracted.source.relative_path.clone(),
        content: extracted.stored_content.clone(),
        content_type: extracted.source.kind.content_type(),
        chunk_text: chunk_text.to_string(),
        chunk_vector: vector,
        timestamp: Utc::now(),
        user_id: options.user_id.clone(),
    }
}

/// Stable id over file identity, modification time, and chunk position.
/// Re-ingesting an unchanged folder writes the same ids, so documents are
/// overwritten in place instead of piling up.
pub fn chunk_document_id(source: &SourceFile, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.relative_path.as_bytes());
    hasher.update(source.file_name.as_bytes());
    hasher.update(source.modified_epoch.to_le_bytes());
    hasher.update((chunk_index as u64).to_le_bytes());
    format!("chunk-{:x}", hasher.finalize())
}
