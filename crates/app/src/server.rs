use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use docstore_core::{DocumentReader, StoreError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<dyn DocumentReader>,
    pub static_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    // Assets (js/css bundles) are served from the static dir directly;
    // every other miss gets index.html so the SPA handles its own routing.
    let frontend = ServeDir::new(&state.static_dir)
        .fallback(ServeFile::new(state.static_dir.join("index.html")));

    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/files/{id}", get(file_content))
        .fallback_service(frontend)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(addr = %listener.local_addr()?, "serving read api");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn list_files(State(state): State<AppState>) -> Response {
    match state.reader.list_files().await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => store_error(err),
    }
}

async fn file_content(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.reader.get_content(&id).await {
        Ok(content) => Json(json!({ "content": content })).into_response(),
        Err(err) => store_error(err),
    }
}

fn store_error(err: StoreError) -> Response {
    let (status, message) = match &err {
        StoreError::NotFound(id) => (StatusCode::NOT_FOUND, format!("document not found: {id}")),
        other => {
            error!(error = %other, "store request failed");
            (StatusCode::BAD_GATEWAY, "document store unavailable".to_string())
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}
