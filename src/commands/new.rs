//! Scaffold a new post

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::SourceConfig;
use crate::Site;

/// Create a new markdown post and return its path
pub fn run(site: &Site, title: &str) -> Result<PathBuf> {
    if !matches!(site.config.source, SourceConfig::Filesystem) {
        anyhow::bail!("`new` only works with the filesystem content source");
    }

    let now = chrono::Local::now();
    let slug = slug::slugify(title);
    if slug.is_empty() {
        anyhow::bail!("Title {:?} does not produce a usable slug", title);
    }

    fs::create_dir_all(&site.posts_dir)
        .with_context(|| format!("Failed to create {:?}", site.posts_dir))?;

    let filename = site
        .config
        .new_post_name
        .replace(":title", &slug)
        .replace(":year", &now.format("%Y").to_string())
        .replace(":month", &now.format("%m").to_string())
        .replace(":day", &now.format("%d").to_string());
    let file_path = site.posts_dir.join(filename);

    // Load scaffold template
    let scaffold_path = site.base_dir.join("scaffolds").join("post.md");
    let scaffold = if scaffold_path.exists() {
        fs::read_to_string(&scaffold_path)?
    } else {
        "---\ntitle: {{ title }}\ndate: {{ date }}\nexcerpt:\ntags: []\n---\n".to_string()
    };

    let content = scaffold
        .replace("{{ title }}", &yaml_string(title))
        .replace("{{ date }}", &now.format("%Y-%m-%d %H:%M:%S").to_string());

    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    fs::write(&file_path, content)?;
    println!("Created: {:?}", file_path);

    Ok(file_path)
}

/// Quote titles that YAML would otherwise misread
fn yaml_string(s: &str) -> String {
    let needs_quotes = s.contains(": ")
        || s.contains(" #")
        || s.starts_with(|c: char| "!&*[]{}|>'\"%@`#,?-".contains(c));
    if needs_quotes {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}
