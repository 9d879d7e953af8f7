//! Ghost Content API source
//!
//! Posts come pre-rendered as HTML, so the markdown pipeline is not used
//! here. The HTTP client is built by the caller and handed to the source.

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::ContentSource;
use crate::config::{GhostConfig, SiteConfig};
use crate::content::post::{Author, FieldSet, PostField, PostRecord, ReadingTime, Tag};
use crate::error::{SiteError, SiteResult};

const SOURCE_NAME: &str = "ghost";

/// A post as returned by the Content API
#[derive(Debug, Clone, Deserialize)]
pub struct GhostPost {
    pub slug: String,
    pub title: Option<String>,
    pub html: Option<String>,
    pub excerpt: Option<String>,
    pub custom_excerpt: Option<String>,
    pub published_at: Option<String>,
    pub reading_time: Option<f64>,
    pub feature_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<GhostTag>,
    pub primary_author: Option<GhostAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostTag {
    pub slug: String,
    pub name: String,
    pub accent_color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostAuthor {
    pub name: String,
    pub profile_image: Option<String>,
    pub twitter: Option<String>,
}

impl From<GhostAuthor> for Author {
    fn from(author: GhostAuthor) -> Self {
        Author {
            name: author.name,
            image: author.profile_image,
            twitter: author
                .twitter
                .map(|t| t.trim_start_matches('@').to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostsEnvelope {
    posts: Vec<GhostPost>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct AuthorsEnvelope {
    authors: Vec<GhostAuthor>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<u32>,
}

/// One page of a browse request
#[derive(Debug)]
pub struct PostsPage {
    pub posts: Vec<GhostPost>,
    pub next: Option<u32>,
}

/// Ghost Content API client
#[derive(Clone)]
pub struct GhostClient {
    client: Client,
    base_url: String,
    key: String,
    version: String,
}

impl GhostClient {
    /// Create a new Ghost client
    pub fn new(url: impl Into<String>, key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            version: version.into(),
        }
    }

    /// Create client from GHOST_API_HOST and GHOST_API_KEY
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_config(&GhostConfig::default())
    }

    /// Create client from configuration, reading the key from
    /// GHOST_API_KEY when the config does not carry one
    pub fn from_config(config: &GhostConfig) -> anyhow::Result<Self> {
        let url = if config.url.is_empty() {
            std::env::var("GHOST_API_HOST").context("source.url or GHOST_API_HOST not set")?
        } else {
            config.url.clone()
        };
        let key = match &config.key {
            Some(key) => key.clone(),
            None => std::env::var("GHOST_API_KEY").context("source.key or GHOST_API_KEY not set")?,
        };
        Ok(Self::new(url, key, config.version.clone()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/ghost/api/{}/content/{}",
            self.base_url, self.version, path
        )
    }

    /// GET a content endpoint; `Ok(None)` on 404
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> SiteResult<Option<T>> {
        let mut query: Vec<(&str, String)> = vec![("key", self.key.clone())];
        query.extend(params.iter().cloned());

        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SiteError::unavailable(SOURCE_NAME, format!("request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let truncated: String = error_text.chars().take(500).collect();
            return Err(SiteError::unavailable(
                SOURCE_NAME,
                format!("{} returned {}: {}", path, status, truncated),
            ));
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| SiteError::unavailable(SOURCE_NAME, format!("malformed response: {}", e)))?;
        Ok(Some(body))
    }

    /// Fetch one page of posts
    pub async fn browse_posts(&self, page: u32, limit: usize, full: bool) -> SiteResult<PostsPage> {
        let mut params = vec![
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("order", "published_at desc".to_string()),
        ];
        if full {
            params.push(("include", "tags,authors".to_string()));
        } else {
            params.push(("fields", "slug".to_string()));
        }

        let envelope: PostsEnvelope = self
            .get("posts/", &params)
            .await?
            .ok_or_else(|| SiteError::unavailable(SOURCE_NAME, "posts endpoint not found"))?;

        Ok(PostsPage {
            next: envelope.meta.and_then(|m| m.pagination.next),
            posts: envelope.posts,
        })
    }

    /// Fetch every post, following pagination
    pub async fn browse_all(&self, limit: usize, full: bool) -> SiteResult<Vec<GhostPost>> {
        let mut posts = Vec::new();
        let mut page = 1;
        loop {
            let result = self.browse_posts(page, limit, full).await?;
            posts.extend(result.posts);
            match result.next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(posts)
    }

    /// Fetch a single post by slug
    pub async fn read_post(&self, slug: &str) -> SiteResult<Option<GhostPost>> {
        let path = format!("posts/slug/{}/", slug);
        let envelope: Option<PostsEnvelope> = self
            .get(&path, &[("include", "tags,authors".to_string())])
            .await?;
        Ok(envelope.and_then(|e| e.posts.into_iter().next()))
    }

    /// Fetch an author by slug
    pub async fn read_author(&self, slug: &str) -> SiteResult<Option<GhostAuthor>> {
        let path = format!("authors/slug/{}/", slug);
        let envelope: Option<AuthorsEnvelope> = self.get(&path, &[]).await?;
        Ok(envelope.and_then(|e| e.authors.into_iter().next()))
    }
}

/// Content source backed by a Ghost CMS
pub struct GhostSource {
    client: GhostClient,
    config: Arc<SiteConfig>,
    author_slug: String,
    page_size: usize,
}

impl GhostSource {
    pub fn new(client: GhostClient, config: Arc<SiteConfig>, ghost: &GhostConfig) -> Self {
        Self {
            client,
            config,
            author_slug: ghost.author_slug.clone(),
            page_size: ghost.page_size.max(1),
        }
    }

    fn to_record(&self, post: GhostPost, fields: &FieldSet) -> SiteResult<PostRecord> {
        let slug = post.slug;
        let title = post
            .title
            .ok_or_else(|| SiteError::malformed(&slug, "missing required field `title`"))?;
        let published_at = post
            .published_at
            .ok_or_else(|| SiteError::malformed(&slug, "missing required field `published_at`"))?;
        let date = DateTime::parse_from_rfc3339(&published_at)
            .map_err(|e| SiteError::malformed(&slug, format!("bad published_at: {}", e)))?;

        let html = post.html.unwrap_or_default();
        let mut record = PostRecord {
            slug: slug.clone(),
            content: html.clone(),
            ..Default::default()
        };

        if fields.contains(PostField::Title) {
            record.title = Some(title);
        }
        if fields.contains(PostField::Date) {
            record.date = Some(date);
        }
        if fields.contains(PostField::Excerpt) {
            record.excerpt = post.custom_excerpt.or(post.excerpt);
        }
        if fields.contains(PostField::Tags) {
            record.tags = Some(
                post.tags
                    .into_iter()
                    .map(|t| {
                        let registry = self.config.tags.get(&t.slug);
                        Tag {
                            slug: t.slug,
                            name: t.name,
                            color: t.accent_color,
                            description: t.description,
                        }
                        .enrich(registry)
                    })
                    .collect(),
            );
        }
        if fields.contains(PostField::Author) {
            record.author = Some(
                post.primary_author
                    .map(Author::from)
                    .unwrap_or_else(|| Author::from(&self.config.author)),
            );
        }
        if fields.contains(PostField::CoverImage) {
            record.cover_image = post.feature_image;
        }
        if fields.contains(PostField::ReadTime) {
            record.reading_time = post.reading_time.map(|minutes| ReadingTime {
                minutes,
                words: 0,
            });
        }
        if fields.contains(PostField::Html) {
            record.html = Some(html);
            record.toc = Some(Vec::new());
        }

        Ok(record)
    }
}

#[async_trait]
impl ContentSource for GhostSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_post_slugs(&self) -> SiteResult<Vec<String>> {
        let posts = self.client.browse_all(self.page_size, false).await?;
        Ok(posts.into_iter().map(|p| p.slug).collect())
    }

    async fn get_post_by_slug(&self, slug: &str, fields: &FieldSet) -> SiteResult<PostRecord> {
        let post = self
            .client
            .read_post(slug)
            .await?
            .ok_or_else(|| SiteError::ContentNotFound(slug.to_string()))?;
        self.to_record(post, fields)
    }

    async fn get_all_records(&self, fields: &FieldSet) -> SiteResult<Vec<PostRecord>> {
        let posts = self.client.browse_all(self.page_size, true).await?;
        posts
            .into_iter()
            .map(|post| self.to_record(post, fields))
            .collect()
    }

    async fn site_author(&self) -> SiteResult<Author> {
        if self.author_slug.is_empty() {
            return Ok(Author::from(&self.config.author));
        }
        self.client
            .read_author(&self.author_slug)
            .await?
            .map(Author::from)
            .ok_or_else(|| SiteError::ContentNotFound(format!("author {}", self.author_slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode as HttpStatus;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn post_json(slug: &str, date: &str) -> serde_json::Value {
        json!({
            "slug": slug,
            "title": format!("Post {}", slug),
            "html": format!("<p>{}</p>", slug),
            "excerpt": "auto excerpt",
            "custom_excerpt": null,
            "published_at": date,
            "reading_time": 3,
            "feature_image": null,
            "tags": [{"slug": "swift", "name": "Swift", "accent_color": "#f97316"}],
            "primary_author": {"name": "Pol Piella", "profile_image": null, "twitter": "@polpielladev"}
        })
    }

    async fn browse(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        if params.get("key").map(String::as_str) != Some("secret") {
            return (HttpStatus::UNAUTHORIZED, "bad key").into_response();
        }
        let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let body = match page {
            1 => json!({
                "posts": [post_json("third", "2024-03-01T00:00:00.000+00:00"),
                          post_json("second", "2024-02-01T00:00:00.000+00:00")],
                "meta": {"pagination": {"page": 1, "pages": 2, "next": 2}}
            }),
            _ => json!({
                "posts": [post_json("first", "2024-01-01T00:00:00.000+00:00")],
                "meta": {"pagination": {"page": 2, "pages": 2, "next": null}}
            }),
        };
        Json(body).into_response()
    }

    async fn read(Path(slug): Path<String>) -> impl IntoResponse {
        if slug == "first" {
            Json(json!({"posts": [post_json("first", "2024-01-01T00:00:00.000+00:00")]}))
                .into_response()
        } else {
            (HttpStatus::NOT_FOUND, "not found").into_response()
        }
    }

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route("/ghost/api/v3/content/posts/", get(browse))
            .route("/ghost/api/v3/content/posts/slug/:slug/", get(read));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(url: &str, key: &str) -> GhostSource {
        let ghost = GhostConfig {
            url: url.to_string(),
            key: Some(key.to_string()),
            page_size: 2,
            ..Default::default()
        };
        let client = GhostClient::from_config(&ghost).unwrap();
        GhostSource::new(client, Arc::new(SiteConfig::default()), &ghost)
    }

    #[tokio::test]
    async fn test_pagination_is_followed() {
        let url = spawn_mock().await;
        let source = source(&url, "secret");

        let slugs = source.list_post_slugs().await.unwrap();
        assert_eq!(slugs, vec!["third", "second", "first"]);

        let records = source.get_all_records(&FieldSet::all()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].html.as_deref(), Some("<p>third</p>"));
        assert_eq!(records[0].tags.as_ref().unwrap()[0].color.as_deref(), Some("#f97316"));
        assert_eq!(records[0].author.as_ref().unwrap().twitter.as_deref(), Some("polpielladev"));
        assert_eq!(records[0].reading_time.unwrap().minutes, 3.0);
    }

    #[tokio::test]
    async fn test_read_by_slug_and_not_found() {
        let url = spawn_mock().await;
        let source = source(&url, "secret");

        let record = source
            .get_post_by_slug("first", &FieldSet::all())
            .await
            .unwrap();
        assert_eq!(record.slug, "first");
        assert_eq!(record.excerpt.as_deref(), Some("auto excerpt"));

        let err = source
            .get_post_by_slug("missing", &FieldSet::all())
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::ContentNotFound(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_is_unavailable() {
        let url = spawn_mock().await;
        let err = source(&url, "wrong").list_post_slugs().await.unwrap_err();
        assert!(matches!(err, SiteError::ContentSourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let err = source("http://127.0.0.1:1", "secret")
            .list_post_slugs()
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::ContentSourceUnavailable { .. }));
    }

    #[test]
    fn test_missing_published_at_is_malformed() {
        let post: GhostPost = serde_json::from_value(json!({
            "slug": "undated",
            "title": "Undated"
        }))
        .unwrap();
        let source = source("http://localhost", "k");
        let err = source.to_record(post, &FieldSet::all()).unwrap_err();
        assert!(matches!(err, SiteError::MalformedFrontMatter { .. }));
    }
}
