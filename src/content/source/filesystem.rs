//! Markdown files with front-matter in a single posts directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::ContentSource;
use crate::config::SiteConfig;
use crate::content::frontmatter::{FrontMatter, TagEntry};
use crate::content::markdown::{plain_text, MarkdownPipeline};
use crate::content::post::{Author, FieldSet, PostField, PostRecord, ReadingTime};
use crate::error::{SiteError, SiteResult};

const SOURCE_NAME: &str = "filesystem";

/// Loads posts from `<base>/<posts_dir>/*.md`
pub struct FileSystemSource {
    posts_dir: PathBuf,
    config: Arc<SiteConfig>,
    pipeline: Arc<MarkdownPipeline>,
    exclude: Vec<glob::Pattern>,
}

impl FileSystemSource {
    pub fn new(
        posts_dir: impl Into<PathBuf>,
        config: Arc<SiteConfig>,
        pipeline: Arc<MarkdownPipeline>,
    ) -> SiteResult<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| SiteError::Config(format!("bad exclude pattern {}: {}", p, e)))
            })
            .collect::<SiteResult<Vec<_>>>()?;

        Ok(Self {
            posts_dir: posts_dir.into(),
            config,
            pipeline,
            exclude,
        })
    }

    /// Markdown files in the posts directory as (slug, path), sorted by file name
    async fn scan(&self) -> SiteResult<Vec<(String, PathBuf)>> {
        let posts_dir = self.posts_dir.clone();
        let exclude = self.exclude.clone();
        tokio::task::spawn_blocking(move || scan_dir(&posts_dir, &exclude))
            .await
            .map_err(|e| SiteError::unavailable(SOURCE_NAME, e))?
    }

    /// Resolve a requested slug against the listing; `name.md` also finds `name`
    async fn locate(&self, slug: &str) -> SiteResult<(String, PathBuf)> {
        let files = self.scan().await?;
        let find = |wanted: &str| files.iter().find(|(s, _)| s == wanted).cloned();
        find(slug)
            .or_else(|| slug.strip_suffix(".md").and_then(find))
            .ok_or_else(|| SiteError::ContentNotFound(slug.to_string()))
    }

    async fn read(&self, slug: &str, path: &Path) -> SiteResult<(FrontMatter, String)> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SiteError::unavailable(SOURCE_NAME, format!("failed to read {:?}: {}", path, e))
        })?;
        let (fm, body) = FrontMatter::parse(&content).map_err(|e| SiteError::malformed(slug, e))?;
        Ok((fm, body.to_string()))
    }

    fn is_listed(&self, fm: &FrontMatter) -> bool {
        fm.published || self.config.render_drafts
    }

    fn build_record(
        &self,
        slug: &str,
        fm: FrontMatter,
        body: String,
        fields: &FieldSet,
    ) -> SiteResult<PostRecord> {
        let title = fm
            .title
            .clone()
            .ok_or_else(|| SiteError::malformed(slug, "missing required field `title`"))?;
        let raw_date = fm
            .date
            .as_deref()
            .ok_or_else(|| SiteError::malformed(slug, "missing required field `date`"))?;
        let date = fm
            .parse_date(&self.config)
            .ok_or_else(|| SiteError::malformed(slug, format!("unparseable date `{}`", raw_date)))?;

        let (excerpt_md, full_md) = MarkdownPipeline::split_excerpt(&body);

        let needs_render = fields.contains(PostField::Html)
            || (fields.contains(PostField::ReadTime) && fm.readtime.is_none());
        let rendered = if needs_render {
            Some(self.pipeline.render(&full_md)?)
        } else {
            None
        };

        let mut record = PostRecord {
            slug: slug.to_string(),
            content: body,
            ..Default::default()
        };

        if fields.contains(PostField::Title) {
            record.title = Some(title);
        }
        if fields.contains(PostField::Date) {
            record.date = Some(date);
        }
        if fields.contains(PostField::Excerpt) {
            record.excerpt = fm
                .excerpt
                .clone()
                .or_else(|| excerpt_md.as_deref().map(plain_text));
        }
        if fields.contains(PostField::Tags) {
            let mut tags = Vec::with_capacity(fm.tags.len());
            for entry in fm.tags.iter().cloned() {
                let tag = entry.into_tag();
                if tag.slug.is_empty() {
                    return Err(SiteError::malformed(
                        slug,
                        format!("tag `{}` has an empty slug", tag.name),
                    ));
                }
                let registry = self.config.tags.get(&tag.slug);
                tags.push(tag.enrich(registry));
            }
            record.tags = Some(tags);
        }
        if fields.contains(PostField::Author) {
            record.author = Some(
                fm.author
                    .clone()
                    .map(Author::from)
                    .unwrap_or_else(|| Author::from(&self.config.author)),
            );
        }
        if fields.contains(PostField::CoverImage) {
            record.cover_image = fm.cover_image.clone();
        }
        if fields.contains(PostField::ReadTime) {
            let words = rendered
                .as_ref()
                .and_then(|r| r.reading_time)
                .map(|r| r.words)
                .unwrap_or_default();
            record.reading_time = match fm.readtime {
                Some(minutes) => Some(ReadingTime { minutes, words }),
                None => rendered.as_ref().and_then(|r| r.reading_time),
            };
        }
        if let Some(rendered) = rendered {
            if fields.contains(PostField::Html) {
                record.html = Some(rendered.html);
                record.toc = Some(rendered.toc);
            }
        }

        Ok(record)
    }
}

#[async_trait]
impl ContentSource for FileSystemSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_post_slugs(&self) -> SiteResult<Vec<String>> {
        let mut slugs = Vec::new();
        for (slug, path) in self.scan().await? {
            let (fm, _) = self.read(&slug, &path).await?;
            if self.is_listed(&fm) {
                slugs.push(slug);
            } else {
                tracing::debug!("Skipping draft {}", slug);
            }
        }
        Ok(slugs)
    }

    async fn get_post_by_slug(&self, slug: &str, fields: &FieldSet) -> SiteResult<PostRecord> {
        let (slug, path) = self.locate(slug).await?;
        let (fm, body) = self.read(&slug, &path).await?;
        self.build_record(&slug, fm, body, fields)
    }

    /// One directory scan, each file read once
    async fn get_all_records(&self, fields: &FieldSet) -> SiteResult<Vec<PostRecord>> {
        let mut records = Vec::new();
        for (slug, path) in self.scan().await? {
            let (fm, body) = self.read(&slug, &path).await?;
            if self.is_listed(&fm) {
                records.push(self.build_record(&slug, fm, body, fields)?);
            }
        }
        Ok(records)
    }

    async fn site_author(&self) -> SiteResult<Author> {
        Ok(Author::from(&self.config.author))
    }
}

fn scan_dir(posts_dir: &Path, exclude: &[glob::Pattern]) -> SiteResult<Vec<(String, PathBuf)>> {
    if !posts_dir.is_dir() {
        return Err(SiteError::unavailable(
            SOURCE_NAME,
            format!("posts directory {:?} does not exist", posts_dir),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(posts_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| SiteError::unavailable(SOURCE_NAME, e))?;
        let path = entry.path();
        if !path.is_file() || !is_markdown_file(path) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if exclude.iter().any(|p| p.matches(&file_name)) {
            tracing::debug!("Excluded {:?}", path);
            continue;
        }

        if let Some(slug) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((slug.to_string(), path.to_path_buf()));
        }
    }

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for (slug, path) in &files {
        if let Some(previous) = seen.insert(slug.as_str(), path.as_path()) {
            return Err(SiteError::malformed(
                slug,
                format!("slug is used by both {:?} and {:?}", previous, path),
            ));
        }
    }

    Ok(files)
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}
