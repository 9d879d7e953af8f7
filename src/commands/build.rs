//! Build the static site

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::runtime::Handle;

use crate::generator::{GenerateStats, Generator};
use crate::server::watch_and_rebuild;
use crate::Site;

/// Generate the static site
pub async fn run(site: &Site) -> Result<()> {
    build(site).await.map(|_| ())
}

/// Generate and report what was written
pub async fn build(site: &Site) -> Result<GenerateStats> {
    let start = Instant::now();

    let aggregator = site.aggregator()?;
    let collection = aggregator
        .collect()
        .await
        .with_context(|| format!("Failed to load posts from {}", aggregator.source().name()))?;
    tracing::info!(
        "Loaded {} posts and {} tags",
        collection.posts.len(),
        collection.tags.len()
    );

    let thumbnails = if site.config.thumbnail.prerender {
        Some(site.thumbnail_renderer().await?)
    } else {
        None
    };

    let generator = Generator::new(site)?;
    let stats = generator.generate(&collection, thumbnails.as_ref()).await?;

    tracing::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());
    Ok(stats)
}

/// Watch for file changes and regenerate
pub async fn watch(site: &Site) -> Result<()> {
    let base_dir = site.base_dir.clone();
    let handle = Handle::current();
    tracing::info!("Watching for changes. Press Ctrl+C to stop.");
    tokio::task::spawn_blocking(move || watch_and_rebuild(&base_dir, &handle))
        .await
        .context("File watcher stopped unexpectedly")?
}
