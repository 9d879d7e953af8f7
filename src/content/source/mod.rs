//! Content sources - the only code that knows how posts are stored

mod filesystem;
mod ghost;

pub use filesystem::FileSystemSource;
pub use ghost::{GhostClient, GhostSource};

use async_trait::async_trait;

use super::post::{Author, FieldSet, PostRecord};
use crate::error::SiteResult;

/// A backend that lists and loads posts
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Slugs of every published post, in a stable listing order
    async fn list_post_slugs(&self) -> SiteResult<Vec<String>>;

    /// Load one post, restricted to `fields`
    async fn get_post_by_slug(&self, slug: &str, fields: &FieldSet) -> SiteResult<PostRecord>;

    /// Load every post, in listing order
    async fn get_all_records(&self, fields: &FieldSet) -> SiteResult<Vec<PostRecord>> {
        let mut records = Vec::new();
        for slug in self.list_post_slugs().await? {
            records.push(self.get_post_by_slug(&slug, fields).await?);
        }
        Ok(records)
    }

    /// The blog owner
    async fn site_author(&self) -> SiteResult<Author>;
}
