//! Generator module - writes the static site into the public directory

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::aggregate::Collection;
use crate::content::{Post, ReadingTime, Tag};
use crate::feed::FeedChannel;
use crate::helpers::full_url_for;
use crate::templates::{tag_path, TemplateRenderer};
use crate::thumbnail::{ThumbnailRenderer, ThumbnailRequest};
use crate::Site;

/// Shape of a post in `api/latest.json` and `GET /api/latest`
#[derive(Debug, Clone, Serialize)]
pub struct LatestPost {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub date: DateTime<FixedOffset>,
    pub tags: Vec<Tag>,
    pub reading_time: ReadingTime,
    pub url: String,
}

impl LatestPost {
    pub fn from_post(post: &Post, site: &Site) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            date: post.date,
            tags: post.tags.clone(),
            reading_time: post.reading_time,
            url: full_url_for(&site.config, &post.path()),
        }
    }

    pub fn list(posts: &[Post], site: &Site) -> Vec<Self> {
        posts
            .iter()
            .take(site.config.latest_count)
            .map(|p| Self::from_post(p, site))
            .collect()
    }
}

/// What a build produced
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerateStats {
    pub posts: usize,
    pub tags: usize,
    pub feeds: usize,
    pub thumbnails: usize,
}

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
    feeds: Vec<FeedChannel>,
}

impl Generator {
    pub fn new(site: &Site) -> Result<Self> {
        Ok(Self {
            site: site.clone(),
            renderer: TemplateRenderer::new()?,
            feeds: site.feed_channels()?,
        })
    }

    /// Generate the entire site
    pub async fn generate(
        &self,
        collection: &Collection,
        thumbnails: Option<&ThumbnailRenderer>,
    ) -> Result<GenerateStats> {
        // Load sections and render every feed first so a failure leaves no partial output
        let mut feeds = Vec::with_capacity(self.feeds.len());
        let mut section_posts = Vec::new();
        for channel in &self.feeds {
            let xml = match channel.section_posts().await? {
                Some(posts) => {
                    let xml = channel.generator.generate(&posts)?;
                    section_posts.extend(posts);
                    xml
                }
                None => channel.generator.generate(&collection.posts)?,
            };
            feeds.push((channel.path(), xml));
        }

        let public_dir = &self.site.public_dir;
        fs::create_dir_all(public_dir)
            .with_context(|| format!("Failed to create {}", public_dir.display()))?;

        self.copy_static_assets()?;

        let config = &self.site.config;
        let index = self.renderer.render_index(config, &collection.posts)?;
        write_file(&public_dir.join("index.html"), index.as_bytes())?;

        let pages: Vec<&Post> = collection.posts.iter().chain(&section_posts).collect();
        for post in &pages {
            let html = self.renderer.render_post(config, post)?;
            let output_path = public_dir
                .join(post.path().trim_matches('/'))
                .join("index.html");
            write_file(&output_path, html.as_bytes())?;
            tracing::debug!("Generated post: {:?}", output_path);
        }

        for tag in &collection.tags {
            let posts = collection.posts_for_tag(&tag.slug);
            let html = self.renderer.render_tag(config, tag, &posts)?;
            let output_path = public_dir.join(tag_path(config, &tag.slug)).join("index.html");
            write_file(&output_path, html.as_bytes())?;
        }
        tracing::info!("Generated {} tag pages", collection.tags.len());

        for (path, xml) in &feeds {
            write_file(&public_dir.join(path), xml.as_bytes())?;
            tracing::info!("Generated {}", path);
        }

        let latest = LatestPost::list(&collection.posts, &self.site);
        write_file(
            &public_dir.join("api").join("latest.json"),
            serde_json::to_string_pretty(&latest)?.as_bytes(),
        )?;

        let mut stats = GenerateStats {
            posts: pages.len(),
            tags: collection.tags.len(),
            feeds: feeds.len(),
            thumbnails: 0,
        };

        if let Some(renderer) = thumbnails {
            stats.thumbnails = self.prerender_thumbnails(renderer, &pages).await?;
        }

        Ok(stats)
    }

    /// Write the Open Graph image of every post
    async fn prerender_thumbnails(
        &self,
        renderer: &ThumbnailRenderer,
        posts: &[&Post],
    ) -> Result<usize> {
        for post in posts {
            let renderer = renderer.clone();
            let request = ThumbnailRequest::new(post.title.clone());
            let png = tokio::task::spawn_blocking(move || renderer.render(&request))
                .await
                .context("Thumbnail task panicked")??;
            write_file(&self.site.public_dir.join(post.og_image_path()), &png)?;
        }
        tracing::info!("Rendered {} thumbnails", posts.len());
        Ok(posts.len())
    }

    fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.site.static_dir;
        if !static_dir.is_dir() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.site.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)
                .with_context(|| format!("Failed to copy {:?}", path))?;
        }

        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
    }
    fs::write(path, contents).map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::Author;
    use tempfile::TempDir;

    fn post(slug: &str, date: &str, tag: &str) -> Post {
        Post {
            slug: slug.to_string(),
            title: format!("Post {}", slug),
            excerpt: Some(format!("About {}", slug)),
            date: DateTime::parse_from_rfc3339(date).unwrap(),
            raw: String::new(),
            html: format!("<p>{}</p>", slug),
            tags: vec![Tag::from_name(tag)],
            reading_time: ReadingTime::from_words(100, 200),
            author: Author::default(),
            cover_image: None,
            toc: Vec::new(),
            section: None,
        }
    }

    fn collection() -> Collection {
        let posts = vec![
            post("d", "2024-04-01T00:00:00Z", "Swift"),
            post("c", "2024-03-01T00:00:00Z", "Rust"),
            post("b", "2024-02-01T00:00:00Z", "Swift"),
            post("a", "2024-01-01T00:00:00Z", "Swift"),
        ];
        Collection {
            tags: vec![Tag::from_name("Swift"), Tag::from_name("Rust")],
            posts,
        }
    }

    #[tokio::test]
    async fn test_generate_writes_site() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("static/img")).unwrap();
        fs::write(dir.path().join("static/img/logo.png"), b"png").unwrap();

        let site = Site::with_config(dir.path().to_path_buf(), SiteConfig::default());
        let stats = Generator::new(&site)
            .unwrap()
            .generate(&collection(), None)
            .await
            .unwrap();
        assert_eq!(stats, GenerateStats { posts: 4, tags: 2, feeds: 1, thumbnails: 0 });

        let public = dir.path().join("public");
        assert!(public.join("index.html").exists());
        assert!(public.join("a/index.html").exists());
        assert!(public.join("img/logo.png").exists());

        let swift = fs::read_to_string(public.join("category/swift/index.html")).unwrap();
        assert!(swift.contains("Post b"));
        assert!(!swift.contains("Post c"));

        let feed = fs::read_to_string(public.join("rss.xml")).unwrap();
        assert_eq!(feed.matches("<item>").count(), 4);

        let latest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(public.join("api/latest.json")).unwrap())
                .unwrap();
        let slugs: Vec<_> = latest
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(slugs, vec!["d", "c", "b"]);
        assert_eq!(latest[0]["url"], "http://localhost:4000/d/");
    }

    #[tokio::test]
    async fn test_prerender_thumbnails() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.thumbnail.prerender = true;
        let site = Site::with_config(dir.path().to_path_buf(), config);

        let renderer = ThumbnailRenderer::with_fonts(&site.config.thumbnail, "", Vec::new()).unwrap();
        let stats = Generator::new(&site)
            .unwrap()
            .generate(&collection(), Some(&renderer))
            .await
            .unwrap();
        assert_eq!(stats.thumbnails, 4);

        let png = fs::read(dir.path().join("public/og/a.png")).unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    fn newsletter_config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.feeds.push(crate::config::FeedConfig {
            path: "newsletter/rss.xml".to_string(),
            title: Some("iOS CI Newsletter".to_string()),
            posts_dir: Some("_newsletter".to_string()),
            ..Default::default()
        });
        config
    }

    #[tokio::test]
    async fn test_section_feed_and_pages() {
        let dir = TempDir::new().unwrap();
        let issues = dir.path().join("_newsletter");
        fs::create_dir_all(&issues).unwrap();
        fs::write(
            issues.join("12.md"),
            "---\ntitle: Issue 12\ndate: 2024-05-01\n---\nCI news.",
        )
        .unwrap();

        let site = Site::with_config(dir.path().to_path_buf(), newsletter_config());
        let stats = Generator::new(&site)
            .unwrap()
            .generate(&collection(), None)
            .await
            .unwrap();
        assert_eq!(stats.posts, 5);
        assert_eq!(stats.feeds, 2);

        let public = dir.path().join("public");
        let main = fs::read_to_string(public.join("rss.xml")).unwrap();
        assert_eq!(main.matches("<item>").count(), 4);
        assert!(!main.contains("Issue 12"));

        let newsletter = fs::read_to_string(public.join("newsletter/rss.xml")).unwrap();
        assert_eq!(newsletter.matches("<item>").count(), 1);
        assert!(newsletter.contains("http://localhost:4000/newsletter/12/"));
        assert!(public.join("newsletter/12/index.html").exists());
    }

    #[tokio::test]
    async fn test_missing_section_dir_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path().to_path_buf(), newsletter_config());

        let result = Generator::new(&site)
            .unwrap()
            .generate(&collection(), None)
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("public").exists());
    }

    #[tokio::test]
    async fn test_bad_feed_pattern_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.feed.strip_patterns = vec!["(".to_string()];
        let site = Site::with_config(dir.path().to_path_buf(), config);

        assert!(Generator::new(&site).is_err());
        assert!(!dir.path().join("public").exists());
    }
}
