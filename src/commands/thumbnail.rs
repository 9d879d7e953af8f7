//! Render a single thumbnail to a file

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::thumbnail::ThumbnailRequest;
use crate::Site;

/// Render `title` to a PNG; defaults to `<slug>.png` in the current directory
pub async fn run(
    site: &Site,
    title: &str,
    description: Option<String>,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let request = ThumbnailRequest::new(title).with_description(description);
    request.validate()?;

    let renderer = site.thumbnail_renderer().await?;
    let png = tokio::task::spawn_blocking(move || renderer.render(&request))
        .await
        .context("Thumbnail task panicked")??;

    let output = output.unwrap_or_else(|| default_output(title));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &png).with_context(|| format!("Failed to write {:?}", output))?;

    println!("Wrote {} ({} bytes)", output.display(), png.len());
    Ok(output)
}

fn default_output(title: &str) -> PathBuf {
    PathBuf::from(format!("{}.png", slug::slugify(title)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_png() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        let out = dir.path().join("out/card.png");

        let written = run(&site, "Hello", Some("World".to_string()), Some(out.clone()))
            .await
            .unwrap();
        assert_eq!(written, out);
        assert_eq!(&fs::read(&out).unwrap()[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[tokio::test]
    async fn test_empty_title_fails() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert!(run(&site, "", None, None).await.is_err());
    }

    #[test]
    fn test_default_output() {
        assert_eq!(default_output("Hello World"), PathBuf::from("hello-world.png"));
    }
}
