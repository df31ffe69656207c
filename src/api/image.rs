/// Image serving endpoint
use crate::{
    context::AppContext,
    error::{AppError, HandlerError},
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures::TryStreamExt;
use serde::Deserialize;

const RETRIEVAL_FAILED: &str = "Error retrieving image";

/// Build image routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/image/:filename", get(get_image))
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    /// Revision of a reused filename: 0 oldest, -1 newest
    pub rev: Option<i64>,
}

/// Stream a stored image by filename
///
/// Content is forwarded chunk by chunk. If the store fails mid-transfer the
/// body ends early and the client sees fewer bytes than `Content-Length`.
async fn get_image(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    Query(query): Query<ImageQuery>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let matches = ctx
        .blob_store
        .find_by_name(&filename)
        .await
        .map_err(|e| e.with_public_message(RETRIEVAL_FAILED))?;

    if matches.is_empty() {
        return Err(AppError::NotFound(filename).into());
    }

    let download = match query.rev {
        Some(revision) => {
            ctx.blob_store
                .open_read_stream_by_revision(&filename, revision)
                .await
        }
        None => ctx.blob_store.open_read_stream(&filename).await,
    }
    .map_err(|e| e.with_public_message(RETRIEVAL_FAILED))?;

    let entry = download.entry;
    let etag = entry.etag();

    // Check If-None-Match header for 304 Not Modified
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if if_none_match
            .to_str()
            .map(|v| etag_matches(v, &etag))
            .unwrap_or(false)
        {
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
                .body(Body::empty())
                .map_err(|e| {
                    AppError::Internal(e.to_string()).with_public_message(RETRIEVAL_FAILED)
                });
        }
    }

    let id = entry.id;
    let body = download.body.inspect_err(move |e| {
        tracing::error!("Streaming blob {} aborted: {}", id, e);
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, entry.content_type.as_str())
        .header(header::CONTENT_LENGTH, entry.length)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(e.to_string()).with_public_message(RETRIEVAL_FAILED))
}

/// Weak comparison of an `If-None-Match` value against a strong ETag
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}
