//! Error types shared by the content, feed and thumbnail layers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while loading, rendering or serving blog content
#[derive(Error, Debug)]
pub enum SiteError {
    /// The requested slug has no backing file or CMS entry
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// The filesystem or CMS could not be read
    #[error("Content source {source_name} unavailable: {reason}")]
    ContentSourceUnavailable { source_name: String, reason: String },

    /// The thumbnail layout or rasterizer failed
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// A post is missing a required front-matter field or has an invalid one
    #[error("Malformed front-matter in {slug}: {reason}")]
    MalformedFrontMatter { slug: String, reason: String },

    /// The markdown pipeline stages are misconfigured
    #[error("Invalid markdown pipeline: {0}")]
    Pipeline(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl SiteError {
    pub fn unavailable(source_name: &str, reason: impl ToString) -> Self {
        SiteError::ContentSourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(slug: &str, reason: impl ToString) -> Self {
        SiteError::MalformedFrontMatter {
            slug: slug.to_string(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status used when the error reaches a request handler
    pub fn status_code(&self) -> StatusCode {
        match self {
            SiteError::ContentNotFound(_) => StatusCode::NOT_FOUND,
            SiteError::ContentSourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SiteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SiteError::RenderFailure(_)
            | SiteError::MalformedFrontMatter { .. }
            | SiteError::Pipeline(_)
            | SiteError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

pub type SiteResult<T> = std::result::Result<T, SiteError>;
