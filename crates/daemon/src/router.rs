//! HTTP routes for browsing, downloading and the index snapshot.
//!
//! Every route sits behind the [`AccessGate`]. JSON endpoints answer errors
//! with an [`ErrorBody`]; the archive and file endpoints answer with plain
//! text since browsers show it directly.
//!
//! Files are served at `/<root>/<path>`, the `url` given in listings.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use protocol::ErrorBody;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::auth::{require_auth, AccessGate};
use crate::config::Config;
use crate::files::{ArchiveStreamer, DirectoryBrowser, FileError, IgnoreList, PathSandbox};

/// Services shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub browser: DirectoryBrowser,
    pub archiver: ArchiveStreamer,
    pub index_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let sandbox = Arc::new(PathSandbox::from_config(&config.storage));
        let ignore = Arc::new(IgnoreList::new(config.storage.ignored_names.iter().cloned()));

        Self {
            browser: DirectoryBrowser::new(Arc::clone(&sandbox), Arc::clone(&ignore)),
            archiver: ArchiveStreamer::new(sandbox, ignore),
            index_path: Arc::new(config.storage.index_path()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Read buffer size for served files.
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Build the application router.
///
/// Each allowed root gets a `/<root>/*path` file route; roots are validated
/// against the fixed routes when the configuration is loaded.
pub fn build_router(state: AppState, gate: Arc<AccessGate>) -> Router {
    let mut router = Router::new()
        .route("/api/list", get(list_handler))
        .route("/api/zip", get(zip_handler))
        .route("/api/index", get(index_handler))
        .route("/health", get(health_handler));

    for root in state.browser.allowed_roots().to_vec() {
        let route = format!("/{}/*path", root);
        router = router.route(
            &route,
            get(move |state: State<AppState>, path: Path<String>| {
                file_handler(state, root.clone(), path)
            }),
        );
    }

    router
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(gate, require_auth))
        .with_state(state)
}

async fn list_handler(State(state): State<AppState>, Query(query): Query<PathQuery>) -> Response {
    match state.browser.list_async(query.path).await {
        Ok(listing) => {
            info!(path = %listing.path, items = listing.items.len(), "List");
            Json(listing).into_response()
        }
        Err(e) => json_error(&e),
    }
}

async fn zip_handler(State(state): State<AppState>, Query(query): Query<PathQuery>) -> Response {
    let target = match state.archiver.prepare(&query.path).await {
        Ok(target) => target,
        Err(e) => return zip_error(&e),
    };

    info!(path = %target.relative(), "Zip");
    let disposition = target.content_disposition();

    let body = match state.archiver.stream(target).begin().await {
        Ok(body) => body,
        Err(e) => return zip_error(&e),
    };

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

async fn file_handler(
    State(state): State<AppState>,
    root: String,
    Path(path): Path<String>,
) -> Response {
    let raw = format!("{}/{}", root, path);
    let opened = match state.browser.open_file(&raw).await {
        Ok(opened) => opened,
        Err(e) => return file_error(&e),
    };

    info!(path = %opened.resolved.relative(), size = opened.size, "File");

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, opened.content_type.to_string()),
            (CONTENT_LENGTH, opened.size.to_string()),
        ],
        Body::from_stream(ReaderStream::with_capacity(opened.file, FILE_CHUNK_SIZE)),
    )
        .into_response()
}

/// Serve the persisted snapshot as-is. Requests never regenerate it.
async fn index_handler(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.index_path.as_path()).await {
        Ok(bytes) => ([(CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = ?state.index_path, "Index snapshot not generated yet");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody::new("Index not generated")),
            )
                .into_response()
        }
        Err(e) => json_error(&FileError::Io(e)),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn fallback_handler() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not found"))).into_response()
}

fn status_for(err: &FileError) -> StatusCode {
    match err {
        FileError::InvalidPath => StatusCode::BAD_REQUEST,
        FileError::NotFound => StatusCode::NOT_FOUND,
        FileError::Io(_) | FileError::Archive(_) | FileError::StreamAborted => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn log_server_error(err: &FileError) {
    if !err.is_client_error() {
        error!(error = %err, "Request failed");
    }
}

fn json_error(err: &FileError) -> Response {
    log_server_error(err);
    (status_for(err), Json(ErrorBody::new(err.client_message()))).into_response()
}

fn zip_error(err: &FileError) -> Response {
    log_server_error(err);
    let message = match err {
        FileError::InvalidPath => "Invalid path",
        FileError::NotFound => "Folder not found",
        FileError::Archive(_) => "Zip error",
        FileError::Io(_) | FileError::StreamAborted => "Server error",
    };
    (status_for(err), message).into_response()
}

fn file_error(err: &FileError) -> Response {
    log_server_error(err);
    let message = match err {
        FileError::InvalidPath => "Invalid path",
        FileError::NotFound => "File not found",
        FileError::Io(_) | FileError::Archive(_) | FileError::StreamAborted => "Server error",
    };
    (status_for(err), message).into_response()
}
