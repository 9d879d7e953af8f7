//! Post aggregation: ordering, tag collection and filtering

use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::TagReconcile;
use crate::content::{ContentSource, FieldSet, Post, Tag};
use crate::error::SiteResult;

/// Sorted posts with their distinct tags
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub posts: Vec<Post>,
    pub tags: Vec<Tag>,
}

impl Collection {
    pub fn posts_for_tag(&self, slug: &str) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|post| post.has_tag(slug))
            .cloned()
            .collect()
    }
}

/// Collects posts from a content source and derives listings from them
pub struct PostAggregator {
    source: Arc<dyn ContentSource>,
    reconcile: TagReconcile,
}

impl PostAggregator {
    pub fn new(source: Arc<dyn ContentSource>, reconcile: TagReconcile) -> Self {
        Self { source, reconcile }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Posts and tags from a single pass over the source
    pub async fn collect(&self) -> SiteResult<Collection> {
        let records = self.source.get_all_records(&FieldSet::all()).await?;
        let listing = records
            .into_iter()
            .map(Post::from_record)
            .collect::<SiteResult<Vec<_>>>()?;

        let mut posts = listing.clone();
        sort_posts(&mut posts);
        let tags = collect_tags(&listing, &posts, self.reconcile);

        tracing::debug!(
            "Aggregated {} posts and {} tags from {}",
            posts.len(),
            tags.len(),
            self.source.name()
        );
        Ok(Collection { posts, tags })
    }

    /// Every post, newest first; equal dates keep listing order
    pub async fn get_all_posts(&self) -> SiteResult<Vec<Post>> {
        Ok(self.collect().await?.posts)
    }

    /// Distinct tags across all posts
    pub async fn get_all_tags(&self) -> SiteResult<Vec<Tag>> {
        Ok(self.collect().await?.tags)
    }

    /// The tag with this slug, if any post carries it
    pub async fn get_tag_for_slug(&self, slug: &str) -> SiteResult<Option<Tag>> {
        Ok(self
            .get_all_tags()
            .await?
            .into_iter()
            .find(|tag| tag.slug == slug))
    }

    /// Posts carrying the tag, newest first
    pub async fn get_posts_for_tag(&self, slug: &str) -> SiteResult<Vec<Post>> {
        Ok(self.collect().await?.posts_for_tag(slug))
    }

    /// The `n` most recent posts
    pub async fn latest(&self, n: usize) -> SiteResult<Vec<Post>> {
        let mut posts = self.get_all_posts().await?;
        posts.truncate(n);
        Ok(posts)
    }
}

/// Newest first; `sort_by` is stable so ties keep their order
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Deduplicate tags by slug.
///
/// `sorted` decides output order. With `FirstSeen` a tag's metadata comes
/// from its first occurrence in `listing`; with `Latest` from the most
/// recent post.
pub fn collect_tags(listing: &[Post], sorted: &[Post], reconcile: TagReconcile) -> Vec<Tag> {
    let metadata_order = match reconcile {
        TagReconcile::FirstSeen => listing,
        TagReconcile::Latest => sorted,
    };

    let mut metadata: IndexMap<&str, &Tag> = IndexMap::new();
    for tag in metadata_order.iter().flat_map(|p| p.tags.iter()) {
        metadata.entry(tag.slug.as_str()).or_insert(tag);
    }

    let mut tags: IndexMap<&str, Tag> = IndexMap::new();
    for tag in sorted.iter().flat_map(|p| p.tags.iter()) {
        tags.entry(tag.slug.as_str())
            .or_insert_with(|| metadata.get(tag.slug.as_str()).copied().unwrap_or(tag).clone());
    }

    tags.into_values().collect()
}
