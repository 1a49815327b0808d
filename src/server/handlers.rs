//! HTTP endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `POST /upload` | Multipart upload (field `file`), becomes the active source |
//! | `GET /stream?path=<id>` | Live `audio/aac` stream of the active source |
//! | `GET /status` | Relay statistics as JSON |

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::relay::Relay;
use crate::stats::RelayStats;

use super::config::{ServerConfig, STREAM_CONTENT_TYPE};
use super::error::{AppError, AppResult};
use super::storage::UploadStore;

/// Room left for multipart boundaries and part headers on top of the file
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared state passed to all request handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub store: Arc<UploadStore>,
    pub config: Arc<ServerConfig>,
}

/// Build the router with all relay endpoints
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .relay
        .max_source_size
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/stream", get(handle_stream))
        .route("/status", get(handle_status))
        .with_state(state)
}

/// Playback reference returned after an upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Handle `POST /upload`
///
/// Stores the `file` field and makes it the active source. Listeners of the
/// previous source are disconnected.
async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let max = state.config.relay.max_source_size;

    // Reject a declared oversize body before reading any of it.
    if let Some(length) = content_length(&headers) {
        if length > max.saturating_add(MULTIPART_OVERHEAD) {
            return Err(AppError::payload_too_large(format!(
                "File size exceeds maximum limit of {max} bytes"
            )));
        }
    }

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return accept_file(&state, field).await;
        }
    }

    Err(AppError::bad_request("Error Retrieving the File"))
}

/// Store one uploaded file and install it as the active source
async fn accept_file(state: &AppState, mut field: Field<'_>) -> AppResult<Json<UploadResponse>> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let (name, mut file) = state
        .store
        .create(&file_name)
        .await
        .map_err(|e| AppError::internal(format!("Error creating the file: {e}")))?;

    let copied = copy_field(&mut field, &mut file, state.config.relay.max_source_size).await;
    drop(file);

    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            state.store.discard(&name).await;
            return Err(e);
        }
    };

    if let Err(e) = state.relay.replace_file(state.store.path_of(&name)).await {
        state.store.discard(&name).await;
        return Err(e.into());
    }

    tracing::info!(name = %name, bytes = written, "Upload accepted");

    Ok(Json(UploadResponse {
        url: state.config.playback_url(&name),
    }))
}

async fn copy_field(field: &mut Field<'_>, file: &mut tokio::fs::File, max: u64) -> AppResult<u64> {
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max {
            return Err(AppError::payload_too_large(format!(
                "File size exceeds maximum limit of {max} bytes"
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::internal(format!("Error writing to the file: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::internal(format!("Error writing to the file: {e}")))?;
    Ok(written)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Query parameters for the stream endpoint
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    path: Option<String>,
}

/// Handle `GET /stream`
///
/// Attaches a subscriber for the lifetime of the response body. Every chunk
/// becomes one body frame and is sent as soon as it arrives.
async fn handle_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Response> {
    let path = query
        .path
        .filter(|path| !path.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing path parameter"))?;

    let subscription = state.relay.subscribe();
    tracing::info!(
        subscriber = %subscription.id(),
        generation = %subscription.generation(),
        path = %path,
        "Listener connected"
    );

    let body = Body::from_stream(subscription.into_stream());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)
        .header(header::CONNECTION, "keep-alive")
        .header(header::CACHE_CONTROL, "no-cache, no-store")
        .body(body)
        .map_err(|_| AppError::internal("Failed to build response"))
}

/// Handle `GET /status`
async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json::<RelayStats>(state.relay.stats())
}
