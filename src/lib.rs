//! folio-rs: a small blog engine
//!
//! Posts come from a content source (markdown files or a Ghost CMS), are
//! aggregated into listings and published as HTML pages, an RSS feed and
//! Open Graph thumbnails, either as a static build or from a live server.

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;
pub mod thumbnail;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aggregate::PostAggregator;
use config::{FeedConfig, SiteConfig, SourceConfig};
use content::{ContentSource, FileSystemSource, GhostClient, GhostSource, MarkdownPipeline};
use feed::{FeedChannel, FeedGenerator};
use thumbnail::{default_tagline, ThumbnailRenderer};

/// A blog rooted at a directory holding `_config.yml`
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: Arc<SiteConfig>,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown posts directory
    pub posts_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets copied into the output
    pub static_dir: PathBuf,
}

impl Site {
    /// Open a site from a directory; a missing `_config.yml` means defaults
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            SiteConfig::load(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config(base_dir: PathBuf, config: SiteConfig) -> Self {
        let posts_dir = base_dir.join(&config.posts_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config: Arc::new(config),
            base_dir,
            posts_dir,
            public_dir,
            static_dir,
        }
    }

    /// The markdown pipeline described by `markdown:` in the config
    pub fn pipeline(&self) -> Result<Arc<MarkdownPipeline>> {
        Ok(Arc::new(MarkdownPipeline::from_config(&self.config.markdown)?))
    }

    /// The configured content source
    pub fn content_source(&self) -> Result<Arc<dyn ContentSource>> {
        let source: Arc<dyn ContentSource> = match &self.config.source {
            SourceConfig::Filesystem => Arc::new(FileSystemSource::new(
                &self.posts_dir,
                self.config.clone(),
                self.pipeline()?,
            )?),
            SourceConfig::Ghost(ghost) => {
                let client = GhostClient::from_config(ghost)?;
                Arc::new(GhostSource::new(client, self.config.clone(), ghost))
            }
        };
        tracing::debug!("Using content source: {}", source.name());
        Ok(source)
    }

    pub fn aggregator(&self) -> Result<PostAggregator> {
        Ok(PostAggregator::new(
            self.content_source()?,
            self.config.tag_reconcile,
        ))
    }

    /// Every configured feed; the main one comes first
    pub fn feed_channels(&self) -> Result<Vec<FeedChannel>> {
        self.config
            .all_feeds()
            .map(|feed| self.feed_channel(feed))
            .collect()
    }

    fn feed_channel(&self, feed: &FeedConfig) -> Result<FeedChannel> {
        let channel = FeedChannel::new(&feed.path, FeedGenerator::new(feed, &self.config)?);
        let (Some(dir), Some(section)) = (&feed.posts_dir, feed.section()) else {
            return Ok(channel);
        };
        let source = FileSystemSource::new(
            self.base_dir.join(dir),
            self.config.clone(),
            self.pipeline()?,
        )?;
        let aggregator = PostAggregator::new(Arc::new(source), self.config.tag_reconcile);
        Ok(channel.with_section(section, aggregator))
    }

    pub async fn thumbnail_renderer(&self) -> Result<ThumbnailRenderer> {
        Ok(ThumbnailRenderer::load(
            &self.config.thumbnail,
            default_tagline(&self.config),
            &self.base_dir,
        )
        .await?)
    }

    /// Generate the static site
    pub async fn generate(&self) -> Result<()> {
        commands::build::run(self).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str) -> Result<PathBuf> {
        commands::new::run(self, title)
    }
}
