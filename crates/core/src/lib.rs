pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod stores;
pub mod traits;

pub use chunker::split_text;
pub use config::{
    ensure_folder, Config, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_DOCS_FOLDER, DEFAULT_INDEX_NAME,
};
pub use embedder::{MiniLmEmbedder, TextEmbedder, EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, IngestError, StoreError};
pub use indexer::BatchIndexer;
pub use models::{
    BulkOutcome, Chunk, ChunkDocument, ContentType, ExtractedFile, FileEntry, FileKind,
    FileOutcome, IndexAction, IndexingStats, IngestionReport, SkipReason, SkippedFile, SourceFile,
};
pub use pipeline::{chunk_document_id, run_ingestion, PipelineOptions};
pub use reader::{discover_files, read_file, scan_folder};
pub use stores::ElasticStore;
pub use traits::{BulkWriter, DocumentReader};
