/// Home page: upload form plus every stored image
use crate::{context::AppContext, error::HandlerError};
use axum::{extract::State, response::Html, routing::get, Router};

/// Build listing routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/", get(list_images))
}

/// Render the listing of all stored blobs
async fn list_images(State(ctx): State<AppContext>) -> Result<Html<String>, HandlerError> {
    let files = ctx
        .blob_store
        .list_blobs()
        .await
        .map_err(|e| e.with_public_message("Error loading images"))?;

    tracing::debug!("Rendering {} stored images", files.len());

    let page = ctx
        .views
        .render_index(&files)
        .map_err(|e| e.with_public_message("Error loading images"))?;

    Ok(Html(page))
}
