use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{backend} returned {status}")]
    HttpStatus {
        backend: String,
        status: reqwest::StatusCode,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Transient failures are whole-request transport errors and throttling
    /// or server-side statuses; per-document rejections are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(_) => true,
            StoreError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {details}")]
    InvalidVar { name: &'static str, details: String },

    #[error("documents folder not found: {0}")]
    MissingFolder(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
