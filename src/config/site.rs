//! Site configuration (_config.yml)

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub timezone: String,
    pub author: AuthorConfig,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub posts_dir: String,
    pub public_dir: String,
    /// Copied verbatim into the public directory
    pub static_dir: String,
    pub tag_dir: String,
    #[serde(default)]
    pub exclude: Vec<String>,

    // Writing
    pub render_drafts: bool,
    pub new_post_name: String,

    // Content source
    #[serde(default)]
    pub source: SourceConfig,

    // Rendering
    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    /// Additional feeds, each usually over its own posts directory
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,

    // Tags
    #[serde(default)]
    pub tags: IndexMap<String, TagConfig>,
    pub tag_reconcile: TagReconcile,

    // API
    pub latest_count: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            language: "en".to_string(),
            timezone: String::new(),
            author: AuthorConfig::default(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            posts_dir: "_posts".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            tag_dir: "category".to_string(),
            exclude: Vec::new(),

            render_drafts: false,
            new_post_name: ":title.md".to_string(),

            source: SourceConfig::default(),

            markdown: MarkdownConfig::default(),
            feed: FeedConfig::default(),
            feeds: Vec::new(),
            thumbnail: ThumbnailConfig::default(),

            tags: IndexMap::new(),
            tag_reconcile: TagReconcile::FirstSeen,

            latest_count: 3,
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, mid-build
    pub fn validate(&self) -> Result<()> {
        if !self.timezone.is_empty() && self.timezone.parse::<chrono_tz::Tz>().is_err() {
            anyhow::bail!("Unknown timezone: {}", self.timezone);
        }
        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            anyhow::bail!("Thumbnail canvas must have a non-zero size");
        }
        if self.markdown.words_per_minute == 0 {
            anyhow::bail!("markdown.words_per_minute must be positive");
        }

        let mut routes = std::collections::HashSet::new();
        for feed in self.all_feeds() {
            let route = feed.path.trim_matches('/');
            if route.is_empty() || route.starts_with("api/") {
                anyhow::bail!("Invalid feed path: {:?}", feed.path);
            }
            if !routes.insert(route) {
                anyhow::bail!("Feed path {:?} is used twice", feed.path);
            }
        }
        Ok(())
    }

    /// Interpret a naive front-matter date in the configured timezone
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => match tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Some(dt.fixed_offset()),
                LocalResult::Ambiguous(earliest, _) => Some(earliest.fixed_offset()),
                // Inside a DST gap: move forward by the gap, like the wall clock does
                LocalResult::None => {
                    let before = tz.from_utc_datetime(&(naive - Duration::hours(3)));
                    let offset = before.offset().fix();
                    let utc = naive - Duration::seconds(offset.local_minus_utc() as i64);
                    Some(tz.from_utc_datetime(&utc).fixed_offset())
                }
            },
            Err(_) => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
        }
    }

    /// The main feed followed by the extra ones
    pub fn all_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        std::iter::once(&self.feed).chain(&self.feeds)
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// The site owner, used whenever a post does not name its own author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub image: Option<String>,
    pub twitter: Option<String>,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "John Doe".to_string(),
            image: None,
            twitter: None,
        }
    }
}

/// Where posts come from
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Markdown files with front-matter under `posts_dir`
    #[default]
    Filesystem,
    /// Ghost Content API
    Ghost(GhostConfig),
}

/// Ghost Content API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostConfig {
    pub url: String,
    /// Content API key; falls back to `GHOST_API_KEY`
    pub key: Option<String>,
    pub version: String,
    pub author_slug: String,
    pub page_size: usize,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: None,
            version: "v3".to_string(),
            author_slug: String::new(),
            page_size: 15,
        }
    }
}

/// Markdown pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    pub highlight_theme: String,
    pub line_numbers: bool,
    pub autolink: AutolinkBehavior,
    pub toc_depth: usize,
    pub words_per_minute: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            highlight_theme: "base16-ocean.dark".to_string(),
            line_numbers: false,
            autolink: AutolinkBehavior::Prepend,
            toc_depth: 3,
            words_per_minute: 200,
        }
    }
}

/// Where autolinked heading anchors go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutolinkBehavior {
    Prepend,
    Append,
    Wrap,
    None,
}

/// What an RSS item's description carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedContent {
    Excerpt,
    Html,
}

/// RSS feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Output path relative to the site root, also the served route
    pub path: String,
    /// Channel title, defaults to the site title
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: FeedContent,
    pub limit: Option<usize>,
    /// Regexes removed from rendered HTML before it goes into the feed
    #[serde(default)]
    pub strip_patterns: Vec<String>,
    /// Posts directory for this feed; unset means the site's own posts
    pub posts_dir: Option<String>,
    /// URL prefix of the post pages under `posts_dir`, defaults to its name
    pub section: Option<String>,
}

impl FeedConfig {
    /// URL section of the feed's own posts, `None` for the site's posts
    pub fn section(&self) -> Option<String> {
        let dir = self.posts_dir.as_deref()?;
        let section = self
            .section
            .as_deref()
            .unwrap_or_else(|| dir.trim_start_matches('_'));
        Some(section.trim_matches('/').to_string())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: "rss.xml".to_string(),
            title: None,
            description: None,
            content: FeedContent::Excerpt,
            limit: None,
            strip_patterns: Vec::new(),
            posts_dir: None,
            section: None,
        }
    }
}

/// Open Graph image settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub width: u32,
    pub height: u32,
    /// Output PNG width; the canvas is scaled to fit
    pub fit_width: u32,
    pub background: String,
    pub gradient: Vec<String>,
    pub title_color: String,
    pub text_color: String,
    pub font_family: String,
    /// Font files, local paths or http(s) URLs
    #[serde(default)]
    pub fonts: Vec<String>,
    /// Load the DejaVu Sans faces shipped with folio
    pub bundled_fonts: bool,
    pub system_fonts: bool,
    /// Footer line, defaults to "<host> · <description>"
    pub tagline: Option<String>,
    /// Write og/<slug>.png for every post during `build`
    pub prerender: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 630,
            fit_width: 2400,
            background: "#ffffff".to_string(),
            gradient: vec!["#0f172a".to_string(), "#4338ca".to_string()],
            title_color: "#FFFBFB".to_string(),
            text_color: "#FFFBFB95".to_string(),
            font_family: "DejaVu Sans".to_string(),
            fonts: Vec::new(),
            bundled_fonts: true,
            system_fonts: false,
            tagline: None,
            prerender: false,
        }
    }
}

/// Display metadata for a tag slug
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TagConfig {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// How to pick tag metadata when posts disagree for one slug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagReconcile {
    /// The first post in the source's listing order wins
    FirstSeen,
    /// The most recently published post wins, even if listed later
    Latest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.posts_dir, "_posts");
        assert_eq!(config.feed.path, "rss.xml");
        assert_eq!(config.latest_count, 3);
        assert_eq!(config.thumbnail.width, 1200);
        assert_eq!(config.thumbnail.height, 630);
        assert!(matches!(config.source, SourceConfig::Filesystem));
    }

    #[test]
    fn test_parse_config() {
        let yaml = r##"
title: Pol Piella Codes
url: https://polpiella.dev/
timezone: Europe/Madrid
author:
  name: Pol Piella
  twitter: polpielladev
source:
  kind: ghost
  url: https://cms.example.com
  author_slug: pol-piella
feed:
  content: html
  strip_patterns:
    - "<p>import .*</p>"
tags:
  swiftui:
    name: SwiftUI
    color: "#9ca3af"
tag_reconcile: latest
"##;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.title, "Pol Piella Codes");
        assert_eq!(config.base_url(), "https://polpiella.dev");
        assert_eq!(config.author.twitter.as_deref(), Some("polpielladev"));
        assert_eq!(config.feed.content, FeedContent::Html);
        assert_eq!(config.tags["swiftui"].name, "SwiftUI");
        assert_eq!(config.tag_reconcile, TagReconcile::Latest);
        match config.source {
            SourceConfig::Ghost(ghost) => {
                assert_eq!(ghost.url, "https://cms.example.com");
                assert_eq!(ghost.version, "v3");
                assert_eq!(ghost.author_slug, "pol-piella");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = SiteConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_localize_uses_timezone() {
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        let utc = SiteConfig::default().localize(naive).unwrap();
        assert_eq!(utc.offset().local_minus_utc(), 0);

        let madrid = SiteConfig {
            timezone: "Europe/Madrid".to_string(),
            ..Default::default()
        };
        let local = madrid.localize(naive).unwrap();
        assert_eq!(local.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_localize_inside_dst_gap() {
        let madrid = SiteConfig {
            timezone: "Europe/Madrid".to_string(),
            ..Default::default()
        };
        // 02:00 jumps to 03:00 on this day
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let local = madrid.localize(naive).unwrap();
        assert_eq!(local.offset().local_minus_utc(), 7200);
        assert_eq!(local.format("%H:%M").to_string(), "03:30");
        assert_eq!(local.naive_utc().format("%H:%M").to_string(), "01:30");
    }

    #[test]
    fn test_extra_feeds() {
        let yaml = r#"
feeds:
  - path: newsletter/rss.xml
    title: iOS CI Newsletter
    posts_dir: _newsletter
    content: html
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let paths: Vec<_> = config.all_feeds().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["rss.xml", "newsletter/rss.xml"]);
        assert_eq!(config.feeds[0].section().as_deref(), Some("newsletter"));
        assert_eq!(config.feed.section(), None);
    }

    #[test]
    fn test_duplicate_feed_paths_rejected() {
        let mut config = SiteConfig::default();
        config.feeds.push(FeedConfig {
            path: "/rss.xml".to_string(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }
}
