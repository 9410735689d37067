use crate::models::{IndexAction, IndexingStats};
use crate::traits::BulkWriter;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry budget for one batch beyond its first attempt. Only transient
/// failures (connection errors, 429, 5xx) are retried; anything else
/// drops the batch immediately.
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Accumulates index actions and flushes them in fixed-size batches.
/// Flushing is best effort: a batch that keeps failing is dropped and
/// counted, never propagated, so one bad batch cannot end the run.
pub struct BatchIndexer<'a, W: BulkWriter> {
    writer: &'a W,
    batch_size: usize,
    pending: Vec<IndexAction>,
    stats: IndexingStats,
}

impl<'a, W: BulkWriter> BatchIndexer<'a, W> {
    pub fn new(writer: &'a W, batch_size: usize) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            stats: IndexingStats::default(),
        }
    }

    pub async fn push(&mut self, action: IndexAction) {
        self.stats.actions_submitted += 1;
        self.pending.push(action);
        if self.pending.len() >= self.batch_size {
            self.flush().await;
        }
    }

    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        let size = batch.len();

        let mut backoff = INITIAL_BACKOFF;
        for attempt in 0..=MAX_RETRIES {
            match self.writer.bulk(&batch).await {
                Ok(outcome) => {
                    self.stats.batches_flushed += 1;
                    self.stats.docs_indexed += outcome.succeeded;
                    self.stats.docs_rejected += outcome.failed;
                    if let Some(reason) = &outcome.first_failure {
                        warn!(rejected = outcome.failed, %reason, "bulk rejected items");
                    }
                    debug!(size, indexed = outcome.succeeded, "flushed batch");
                    return;
                }
                Err(error) if error.is_transient() && attempt < MAX_RETRIES => {
                    warn!(
                        attempt = attempt + 1,
                        delay_secs = backoff.as_secs(),
                        %error,
                        "bulk write failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(error) => {
                    warn!(size, %error, "dropping batch after unrecoverable failure");
                    self.stats.batches_dropped += 1;
                    self.stats.docs_rejected += size;
                    return;
                }
            }
        }
    }

    /// Flushes the tail batch and hands back the run counters.
    pub async fn finish(mut self) -> IndexingStats {
        self.flush().await;
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{BulkOutcome, ChunkDocument, ContentType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted writer: pops one result per bulk call and records batch sizes.
    struct ScriptedWriter {
        script: Mutex<Vec<Result<BulkOutcome, StoreError>>>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedWriter {
        fn new(script: Vec<Result<BulkOutcome, StoreError>>) -> Self {
            Self {
                script: Mutex::new(script),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }

        fn all_ok() -> Self {
            Self {
                script: Mutex::new(Vec::new()),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BulkWriter for ScriptedWriter {
        async fn ensure_index(&self, _dimensions: usize) -> Result<(), StoreError> {
            Ok(())
        }

        async fn bulk(&self, actions: &[IndexAction]) -> Result<BulkOutcome, StoreError> {
            self.batch_sizes.lock().unwrap().push(actions.len());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(BulkOutcome {
                    succeeded: actions.len(),
                    failed: 0,
                    first_failure: None,
                });
            }
            script.remove(0)
        }
    }

    fn action(id: &str) -> IndexAction {
        IndexAction {
            document_id: id.to_string(),
            document: ChunkDocument {
                file_name: "a.txt".to_string(),
                path: String::new(),
                content: "body".to_string(),
                content_type: ContentType::Text,
                chunk_text: "body".to_string(),
                chunk_vector: vec![0.0; 4],
                timestamp: chrono::Utc::now(),
                user_id: None,
            },
        }
    }

    fn transient() -> StoreError {
        StoreError::HttpStatus {
            backend: "elasticsearch".to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn unrecoverable() -> StoreError {
        StoreError::HttpStatus {
            backend: "elasticsearch".to_string(),
            status: reqwest::StatusCode::BAD_REQUEST,
        }
    }

    #[tokio::test]
    async fn flushes_in_fixed_size_batches() {
        let writer = ScriptedWriter::all_ok();
        let mut indexer = BatchIndexer::new(&writer, 2);
        for id in ["a", "b", "c", "d", "e"] {
            indexer.push(action(id)).await;
        }
        let stats = indexer.finish().await;

        assert_eq!(*writer.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(stats.actions_submitted, 5);
        assert_eq!(stats.docs_indexed, 5);
        assert_eq!(stats.batches_flushed, 3);
        assert_eq!(stats.batches_dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_then_succeeds() {
        let writer = ScriptedWriter::new(vec![
            Err(transient()),
            Ok(BulkOutcome {
                succeeded: 1,
                failed: 0,
                first_failure: None,
            }),
        ]);
        let mut indexer = BatchIndexer::new(&writer, 1);
        indexer.push(action("a")).await;
        let stats = indexer.finish().await;

        assert_eq!(writer.batch_sizes.lock().unwrap().len(), 2);
        assert_eq!(stats.docs_indexed, 1);
        assert_eq!(stats.batches_flushed, 1);
        assert_eq!(stats.batches_dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded_then_batch_is_dropped() {
        let writer = ScriptedWriter::new(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
        ]);
        let mut indexer = BatchIndexer::new(&writer, 1);
        indexer.push(action("a")).await;
        let stats = indexer.finish().await;

        // Initial attempt plus MAX_RETRIES.
        assert_eq!(writer.batch_sizes.lock().unwrap().len(), 3);
        assert_eq!(stats.docs_indexed, 0);
        assert_eq!(stats.docs_rejected, 1);
        assert_eq!(stats.batches_dropped, 1);
    }

    #[tokio::test]
    async fn unrecoverable_failure_drops_without_retry() {
        let writer = ScriptedWriter::new(vec![Err(unrecoverable())]);
        let mut indexer = BatchIndexer::new(&writer, 2);
        indexer.push(action("a")).await;
        indexer.push(action("b")).await;
        let stats = indexer.finish().await;

        assert_eq!(writer.batch_sizes.lock().unwrap().len(), 1);
        assert_eq!(stats.docs_rejected, 2);
        assert_eq!(stats.batches_dropped, 1);
        assert_eq!(stats.batches_flushed, 0);
    }

    #[tokio::test]
    async fn per_item_rejections_are_counted() {
        let writer = ScriptedWriter::new(vec![Ok(BulkOutcome {
            succeeded: 1,
            failed: 1,
            first_failure: Some("mapper_parsing_exception".to_string()),
        })]);
        let mut indexer = BatchIndexer::new(&writer, 2);
        indexer.push(action("a")).await;
        indexer.push(action("b")).await;
        let stats = indexer.finish().await;

        assert_eq!(stats.docs_indexed, 1);
        assert_eq!(stats.docs_rejected, 1);
        assert_eq!(stats.batches_flushed, 1);
    }

    #[tokio::test]
    async fn finish_with_no_actions_is_a_no_op() {
        let writer = ScriptedWriter::all_ok();
        let indexer = BatchIndexer::new(&writer, 2);
        let stats = indexer.finish().await;

        assert!(writer.batch_sizes.lock().unwrap().is_empty());
        assert_eq!(stats, IndexingStats::default());
    }
}
