/// Image upload endpoint
use crate::{
    context::AppContext,
    error::{AppError, HandlerError},
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

/// Build upload routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/upload", post(upload_image))
}

/// Store the `file` part of a multipart form and redirect to the listing
///
/// The part is streamed into the blob store as it arrives, so the whole
/// file is never held in memory.
async fn upload_image(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HandlerError> {
    // A request that is not multipart at all carries no file
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected non-multipart upload: {}", e);
        AppError::MissingFile
    })?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        // Browsers send an empty filename when nothing was selected
        let Some(filename) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(String::from)
        else {
            continue;
        };
        let content_type = field.content_type().map(String::from);

        let mut upload = ctx
            .blob_store
            .open_upload_stream(&filename, content_type.as_deref());

        loop {
            match field.chunk().await {
                Ok(Some(bytes)) => upload
                    .write(&bytes)
                    .await
                    .map_err(|e| e.with_public_message("Upload failed"))?,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Upload {} of {} interrupted after {} bytes: {}",
                        upload.id(),
                        filename,
                        upload.bytes_written(),
                        e
                    );
                    if let Err(abort_err) = upload.abort().await {
                        tracing::warn!("Failed to abort upload of {}: {}", filename, abort_err);
                    }
                    return Err(AppError::Multipart(e.to_string()).into());
                }
            }
        }

        let entry = upload
            .finish()
            .await
            .map_err(|e| e.with_public_message("Upload failed"))?;

        tracing::info!(
            "File uploaded: {} ({} bytes, {}, id {})",
            entry.filename,
            entry.length,
            entry.content_type,
            entry.id
        );

        return Ok(redirect_home());
    }

    Err(AppError::MissingFile.into())
}

fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}
