mod template;

use axum::{
    Router,
    body::Body,
    extract::{Path as UrlPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::{io, path::Path};
use tokio_util::io::ReaderStream;

use crate::{error::AppError, state::AppState};

/// Public pages: (name, title). `<site root>/pages/<name>.html` holds the body.
pub const PAGES: &[(&str, &str)] = &[
    ("index", "Home"),
    ("collections", "Collections"),
    ("about", "About"),
    ("impacts", "Impacts"),
    ("sustainability", "Sustainability"),
    ("community", "Community"),
    ("other", "Other"),
    ("contact", "Contact"),
    ("thank-you", "Thank You"),
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/static/{*path}", get(serve_static))
        .route("/{page}", get(page))
}

async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    render_page(&state, "index").await
}

async fn page(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, AppError> {
    // `/index` is only reachable as `/`.
    if name == "index" {
        return Err(AppError::NotFound);
    }
    render_page(&state, &name).await
}

async fn render_page(state: &AppState, name: &str) -> Result<Response, AppError> {
    let (name, title) = PAGES
        .iter()
        .find(|(n, _)| *n == name)
        .copied()
        .ok_or(AppError::NotFound)?;

    let fragment_path = state.site_root.join("pages").join(format!("{name}.html"));
    let body = match tokio::fs::read_to_string(&fragment_path).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("Cannot read page fragment {}: {}", fragment_path.display(), e);
            String::new()
        }
    };

    Ok(Html(template::page(name, title, &body).into_string()).into_response())
}

async fn serve_static(
    State(state): State<AppState>,
    UrlPath(rel): UrlPath<String>,
) -> Result<Response, AppError> {
    // Reject path traversal attempts early.
    if rel.split('/').any(|seg| seg == "..") {
        return Err(AppError::NotFound);
    }
    let fs_path = state.canonical_root.join("static").join(rel.trim_start_matches('/'));
    let real_path = validate_path(&state, &fs_path).await?;

    let file = tokio::fs::File::open(&real_path).await.map_err(io_err)?;
    let meta = file.metadata().await.map_err(AppError::Io)?;
    if !meta.is_file() {
        return Err(AppError::NotFound);
    }

    let mime: &'static str = mime_guess::from_path(&real_path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, meta.len())
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Canonicalize `path` (resolving symlinks) and verify it stays within
/// `<site root>/static`. Returns the resolved path on success.
async fn validate_path(state: &AppState, path: &Path) -> Result<std::path::PathBuf, AppError> {
    let canonical = tokio::fs::canonicalize(path).await.map_err(io_err)?;
    if !canonical.starts_with(state.canonical_root.join("static")) {
        return Err(AppError::NotFound);
    }
    Ok(canonical)
}

/// Map an `io::Error` to `AppError`, translating `NotFound` appropriately.
fn io_err(e: io::Error) -> AppError {
    if e.kind() == io::ErrorKind::NotFound {
        AppError::NotFound
    } else {
        AppError::Io(e)
    }
}
