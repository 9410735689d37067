use crate::error::{IngestError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Vector width produced by the MiniLM model and declared in the index
/// mapping. Every stored vector must have exactly this many components.
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Turns chunk text into fixed-width vectors. Implementations must return
/// one vector per input text, in input order.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Local all-MiniLM-L6-v2 inference. Model init downloads weights on first
/// use; inference runs on the blocking pool because ONNX sessions are not
/// async-aware.
pub struct MiniLmEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl MiniLmEmbedder {
    pub async fn load() -> Result<Self> {
        info!(model = "all-MiniLM-L6-v2", "loading embedding model");

        let model = tokio::task::spawn_blocking(|| {
            TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
            )
        })
        .await
        .map_err(|error| IngestError::Embedding(error.to_string()))?
        .map_err(|error| IngestError::Embedding(error.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl TextEmbedder for MiniLmEmbedder {
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| IngestError::Embedding("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|error| IngestError::Embedding(error.to_string()))
        })
        .await
        .map_err(|error| IngestError::Embedding(error.to_string()))?
    }
}
