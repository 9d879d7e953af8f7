//! Built-in page templates using the Tera template engine
//!
//! Templates are embedded in the binary; a site needs no theme directory.

use anyhow::Result;
use chrono::{Datelike, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::markdown::toc_html;
use crate::content::{Post, Tag};
use crate::helpers::{date_xml, full_date, full_url_for, thumbnail_url_for, url_for};

/// Template renderer with the embedded folio templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Content HTML is inserted verbatim; templates escape text explicitly
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("folio/layout.html")),
            ("index.html", include_str!("folio/index.html")),
            ("post.html", include_str!("folio/post.html")),
            ("tag.html", include_str!("folio/tag.html")),
            ("partials/head.html", include_str!("folio/partials/head.html")),
            (
                "partials/post_list.html",
                include_str!("folio/partials/post_list.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    pub fn render_index(&self, config: &SiteConfig, posts: &[Post]) -> Result<String> {
        let mut context = base_context(config);
        context.insert(
            "meta",
            &MetaData {
                title: config.title.clone(),
                description: config.description.clone(),
                url: full_url_for(config, ""),
                image: thumbnail_url_for(config, &config.title, None),
                og_type: "website",
            },
        );
        context.insert("posts", &PostData::list(posts, config));
        self.render("index.html", &context)
    }

    pub fn render_post(&self, config: &SiteConfig, post: &Post) -> Result<String> {
        let data = PostData::from_post(post, config);
        let mut context = base_context(config);
        context.insert(
            "meta",
            &MetaData {
                title: post.title.clone(),
                description: post.excerpt.clone().unwrap_or_default(),
                url: data.permalink.clone(),
                image: data.og_image.clone(),
                og_type: "article",
            },
        );
        context.insert("post", &data);
        self.render("post.html", &context)
    }

    pub fn render_tag(&self, config: &SiteConfig, tag: &Tag, posts: &[Post]) -> Result<String> {
        let data = TagData::from_tag(tag, config);
        let mut context = base_context(config);
        context.insert(
            "meta",
            &MetaData {
                title: tag.name.clone(),
                description: tag.description.clone().unwrap_or_default(),
                url: full_url_for(config, &data.path),
                image: thumbnail_url_for(config, &tag.name, tag.description.as_deref()),
                og_type: "website",
            },
        );
        context.insert("tag", &data);
        context.insert("posts", &PostData::list(posts, config));
        self.render("tag.html", &context)
    }
}

fn base_context(config: &SiteConfig) -> Context {
    let mut context = Context::new();
    context.insert("config", &ConfigData::from_config(config));
    context.insert("now_year", &Utc::now().year());
    context
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub twitter: Option<String>,
    pub language: String,
    pub url: String,
    pub root: String,
    pub feed_url: String,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.name.clone(),
            twitter: config.author.twitter.clone(),
            language: config.language.clone(),
            url: config.base_url().to_string(),
            root: url_for(config, ""),
            feed_url: url_for(config, &config.feed.path),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaData {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: String,
    pub og_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub slug: String,
    pub title: String,
    pub path: String,
    pub permalink: String,
    pub date_iso: String,
    pub date_display: String,
    pub excerpt: Option<String>,
    pub html: String,
    pub reading_time: String,
    pub author: String,
    pub cover_image: Option<String>,
    pub tags: Vec<TagData>,
    pub toc: String,
    pub og_image: String,
}

impl PostData {
    pub fn from_post(post: &Post, config: &SiteConfig) -> Self {
        let path = url_for(config, &post.path());
        let og_image = if config.thumbnail.prerender {
            full_url_for(config, &post.og_image_path())
        } else {
            thumbnail_url_for(config, &post.title, None)
        };

        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            permalink: full_url_for(config, &post.path()),
            path,
            date_iso: date_xml(&post.date),
            date_display: full_date(&post.date),
            excerpt: post.excerpt.clone(),
            html: post.html.clone(),
            reading_time: post.reading_time.label(),
            author: post.author.name.clone(),
            cover_image: post.cover_image.clone(),
            tags: post
                .tags
                .iter()
                .map(|t| TagData::from_tag(t, config))
                .collect(),
            toc: if post.toc.is_empty() {
                String::new()
            } else {
                toc_html(&post.toc)
            },
            og_image,
        }
    }

    pub fn list(posts: &[Post], config: &SiteConfig) -> Vec<Self> {
        posts.iter().map(|p| Self::from_post(p, config)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub slug: String,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub path: String,
}

impl TagData {
    pub fn from_tag(tag: &Tag, config: &SiteConfig) -> Self {
        Self {
            slug: tag.slug.clone(),
            name: tag.name.clone(),
            color: tag.color.clone(),
            description: tag.description.clone(),
            path: url_for(config, &tag_path(config, &tag.slug)),
        }
    }
}

/// Site-relative path of a tag page, e.g. `category/swift/`
pub fn tag_path(config: &SiteConfig, slug: &str) -> String {
    format!("{}/{}/", config.tag_dir.trim_matches('/'), slug)
}
