/// API routes and handlers
pub mod home;
pub mod image;
pub mod upload;
pub mod views;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(home::routes())
        .merge(upload::routes())
        .merge(image::routes())
}
