/// HTML rendering for the home page
use crate::{
    blob_store::BlobIndexEntry,
    error::{AppError, AppResult},
};
use handlebars::Handlebars;
use serde::Serialize;

const INDEX_TEMPLATE: &str = "index";

/// Page templates, registered once at startup
pub struct Views {
    engine: Handlebars<'static>,
}

#[derive(Serialize)]
struct IndexPage<'a> {
    files: Vec<ImageCard<'a>>,
}

#[derive(Serialize)]
struct ImageCard<'a> {
    filename: &'a str,
    href: String,
}

impl Views {
    pub fn new() -> AppResult<Self> {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);

        engine
            .register_template_string(INDEX_TEMPLATE, include_str!("../../templates/index.hbs"))
            .map_err(|e| AppError::Internal(format!("Failed to register template: {}", e)))?;

        Ok(Self { engine })
    }

    /// Render the upload form and gallery of stored images
    pub fn render_index(&self, files: &[BlobIndexEntry]) -> AppResult<String> {
        let page = IndexPage {
            files: files
                .iter()
                .map(|file| ImageCard {
                    filename: &file.filename,
                    href: image_href(&file.filename),
                })
                .collect(),
        };

        self.engine
            .render(INDEX_TEMPLATE, &page)
            .map_err(|e| AppError::Internal(format!("Failed to render index: {}", e)))
    }
}

/// Path serving a stored image
pub fn image_href(filename: &str) -> String {
    format!("/image/{}", urlencoding::encode(filename))
}
