use crate::error::StoreError;
use crate::models::{BulkOutcome, FileEntry, IndexAction};
use crate::traits::{BulkWriter, DocumentReader};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const BACKEND: &str = "elasticsearch";

/// Default per-request deadline. Bulk writes get a longer one because a
/// full batch of vectors is a multi-megabyte payload.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BULK_TIMEOUT: Duration = Duration::from_secs(120);

/// How many entries a single file listing returns.
const LIST_SIZE: usize = 1000;

pub struct ElasticStore {
    client: Client,
    endpoint: String,
    index_name: String,
    api_key: Option<String>,
}

impl ElasticStore {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StoreError::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            api_key,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("ApiKey {key}")),
            None => request,
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }

    /// Round-trips to the cluster root so bad endpoints and credentials
    /// surface before any ingestion work starts.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.get(&self.endpoint))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        let cluster = body
            .pointer("/cluster_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(cluster, "connected to elasticsearch");
        Ok(())
    }

    /// Drops the target index. A missing index is treated as already done.
    pub async fn delete_index(&self) -> Result<bool, StoreError> {
        let response = self
            .authorize(self.client.delete(self.index_url()))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status,
            }),
        }
    }

    async fn mapped_vector_dimensions(&self) -> Result<Option<usize>, StoreError> {
        let response = self
            .authorize(self.client.get(format!("{}/_mapping", self.index_url())))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        let dims = body
            .pointer(&format!(
                "/{}/mappings/properties/chunk_vector/dims",
                self.index_name
            ))
            .and_then(Value::as_u64);
        Ok(dims.map(|value| value as usize))
    }
}

#[async_trait]
impl BulkWriter for ElasticStore {
    async fn ensure_index(&self, dimensions: usize) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.head(self.index_url()))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            if let Some(existing) = self.mapped_vector_dimensions().await? {
                if existing != dimensions {
                    return Err(StoreError::BackendResponse {
                        backend: BACKEND.to_string(),
                        details: format!(
                            "index '{}' maps chunk_vector with {existing} dims, embedder produces {dimensions}",
                            self.index_name
                        ),
                    });
                }
            }
            debug!(index = %self.index_name, "index already exists");
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let response = self
            .authorize(self.client.put(self.index_url()))
            .json(&json!({
                "mappings": {
                    "properties": {
                        "file_name": {"type": "keyword"},
                        "path": {"type": "keyword"},
                        "content": {"type": "text", "index": false},
                        "content_type": {"type": "keyword"},
                        "chunk_text": {"type": "text"},
                        "chunk_vector": {
                            "type": "dense_vector",
                            "dims": dimensions,
                            "index": true,
                            "similarity": "cosine"
                        },
                        "timestamp": {"type": "date"},
                        "user_id": {"type": "keyword"}
                    }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("index creation failed with {status}: {details}"),
            });
        }

        info!(index = %self.index_name, dimensions, "created index");
        Ok(())
    }

    async fn bulk(&self, actions: &[IndexAction]) -> Result<BulkOutcome, StoreError> {
        if actions.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut lines = Vec::with_capacity(actions.len() * 2);
        for action in actions {
            lines.push(serde_json::to_string(&json!({
                "index": {
                    "_index": self.index_name,
                    "_id": action.document_id,
                }
            }))?);
            lines.push(serde_json::to_string(&action.document)?);
        }
        let payload = lines.join("\n") + "\n";

        let response = self
            .authorize(self.client.post(format!("{}/_bulk", self.endpoint)))
            .header("Content-Type", "application/x-ndjson")
            .timeout(BULK_TIMEOUT)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        Ok(bulk_outcome(&body))
    }
}

#[async_trait]
impl DocumentReader for ElasticStore {
    async fn list_files(&self) -> Result<Vec<FileEntry>, StoreError> {
        let response = self
            .authorize(self.client.post(format!("{}/_search", self.index_url())))
            .json(&json!({
                "size": LIST_SIZE,
                "query": {"match_all": {}},
                "_source": ["file_name", "path"]
            }))
            .send()
            .await?;

        // A store without the index yet is an empty store, not a failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut entries = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit
                .pointer("/_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let file_name = hit
                .pointer("/_source/file_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let path = hit
                .pointer("/_source/path")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            entries.push(FileEntry {
                id,
                file_name,
                path,
            });
        }

        Ok(entries)
    }

    async fn get_content(&self, id: &str) -> Result<String, StoreError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/_doc/{}", self.index_url(), id)),
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::HttpStatus {
                backend: BACKEND.to_string(),
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        let content = body
            .pointer("/_source/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }
}

/// Tallies the per-item results of a `_bulk` response body.
fn bulk_outcome(body: &Value) -> BulkOutcome {
    let items = body
        .pointer("/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut outcome = BulkOutcome::default();
    for item in &items {
        let entry = item
            .pointer("/index")
            .or_else(|| item.pointer("/create"))
            .unwrap_or(&Value::Null);
        let status = entry
            .pointer("/status")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if (200..300).contains(&status) {
            outcome.succeeded += 1;
        } else {
            outcome.failed += 1;
            if outcome.first_failure.is_none() {
                let reason = entry
                    .pointer("/error/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown rejection");
                outcome.first_failure = Some(format!("status {status}: {reason}"));
            }
        }
    }

    outcome
}
