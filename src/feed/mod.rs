//! RSS 2.0 feed generation

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::aggregate::PostAggregator;
use crate::config::{FeedConfig, FeedContent, SiteConfig};
use crate::content::Post;
use crate::error::{SiteError, SiteResult};
use crate::helpers::{
    absolutize_urls, escape_xml, full_url_for, rfc822, strip_html, strip_invalid_xml_chars,
    truncate,
};

/// Characters of plain-text fallback used when a post has no excerpt
const FALLBACK_EXCERPT_CHARS: usize = 280;

/// Builds the RSS document for a list of posts
#[derive(Debug, Clone)]
pub struct FeedGenerator {
    title: String,
    link: String,
    description: String,
    language: String,
    self_link: String,
    site_url: String,
    base_url: String,
    content: FeedContent,
    strip_patterns: Vec<Regex>,
    limit: Option<usize>,
    fallback_build_date: DateTime<Utc>,
}

impl FeedGenerator {
    pub fn new(feed: &FeedConfig, site: &SiteConfig) -> SiteResult<Self> {
        let strip_patterns = feed
            .strip_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| SiteError::Config(format!("invalid feed strip pattern {:?}: {}", p, e)))
            })
            .collect::<SiteResult<Vec<_>>>()?;

        Ok(Self {
            title: feed.title.clone().unwrap_or_else(|| site.title.clone()),
            link: full_url_for(site, &feed.section().unwrap_or_default()),
            description: feed
                .description
                .clone()
                .unwrap_or_else(|| site.description.clone()),
            language: site.language.clone(),
            self_link: full_url_for(site, &feed.path),
            site_url: full_url_for(site, ""),
            base_url: site.base_url().to_string(),
            content: feed.content,
            strip_patterns,
            limit: feed.limit,
            fallback_build_date: Utc::now(),
        })
    }

    /// Build date used when there are no posts
    pub fn with_fallback_date(mut self, date: DateTime<Utc>) -> Self {
        self.fallback_build_date = date;
        self
    }

    /// Render the feed. Items keep the order of `posts`.
    pub fn generate(&self, posts: &[Post]) -> SiteResult<String> {
        let posts = match self.limit {
            Some(limit) => &posts[..limit.min(posts.len())],
            None => posts,
        };

        let last_build = posts
            .iter()
            .map(|p| p.date)
            .max()
            .map(|d| rfc822(&d))
            .unwrap_or_else(|| rfc822(&self.fallback_build_date));

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str("  <channel>\n");
        feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&self.title)));
        feed.push_str(&format!("    <link>{}</link>\n", escape_xml(&self.link)));
        feed.push_str(&format!(
            "    <description>{}</description>\n",
            escape_xml(&self.description)
        ));
        if !self.language.is_empty() {
            feed.push_str(&format!(
                "    <language>{}</language>\n",
                escape_xml(&self.language)
            ));
        }
        feed.push_str(&format!("    <lastBuildDate>{}</lastBuildDate>\n", last_build));
        feed.push_str(&format!(
            "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>\n",
            escape_xml(&self.self_link)
        ));

        for post in posts {
            self.push_item(&mut feed, post);
        }

        feed.push_str("  </channel>\n");
        feed.push_str("</rss>\n");

        tracing::debug!("Rendered feed with {} items", posts.len());
        Ok(feed)
    }

    fn push_item(&self, feed: &mut String, post: &Post) {
        let url = format!("{}{}", self.site_url.trim_end_matches('/'), post.path());

        feed.push_str("    <item>\n");
        feed.push_str(&format!(
            "      <guid isPermaLink=\"true\">{}</guid>\n",
            escape_xml(&url)
        ));
        feed.push_str(&format!("      <title>{}</title>\n", escape_xml(&post.title)));
        feed.push_str(&format!("      <link>{}</link>\n", escape_xml(&url)));
        match self.content {
            FeedContent::Excerpt => {
                feed.push_str(&format!(
                    "      <description>{}</description>\n",
                    escape_xml(&item_excerpt(post))
                ));
            }
            FeedContent::Html => {
                feed.push_str(&format!(
                    "      <description>{}</description>\n",
                    cdata(&self.clean_html(&post.html))
                ));
            }
        }
        feed.push_str(&format!("      <pubDate>{}</pubDate>\n", rfc822(&post.date)));
        feed.push_str("    </item>\n");
    }

    fn clean_html(&self, html: &str) -> String {
        let stripped = self
            .strip_patterns
            .iter()
            .fold(html.to_string(), |acc, re| re.replace_all(&acc, "").into_owned());
        strip_invalid_xml_chars(&absolutize_urls(&stripped, &self.base_url))
    }
}

/// A feed served and written by the site, with the posts it publishes
pub struct FeedChannel {
    path: String,
    pub generator: FeedGenerator,
    section: Option<(String, PostAggregator)>,
}

impl FeedChannel {
    /// A feed over the site's main posts
    pub fn new(path: &str, generator: FeedGenerator) -> Self {
        Self {
            path: path.trim_matches('/').to_string(),
            generator,
            section: None,
        }
    }

    /// Publish the posts of `aggregator`, whose pages live under `/<section>/`
    pub fn with_section(mut self, section: impl Into<String>, aggregator: PostAggregator) -> Self {
        self.section = Some((section.into(), aggregator));
        self
    }

    /// Output path relative to the public directory
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Route the server answers on
    pub fn route(&self) -> String {
        format!("/{}", self.path)
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_ref().map(|(name, _)| name.as_str())
    }

    /// Posts of the feed's own section, newest first; `None` for the main feed
    pub async fn section_posts(&self) -> SiteResult<Option<Vec<Post>>> {
        let Some((name, aggregator)) = &self.section else {
            return Ok(None);
        };
        let mut posts = aggregator.get_all_posts().await?;
        for post in &mut posts {
            post.section = Some(name.clone());
        }
        Ok(Some(posts))
    }
}

fn item_excerpt(post: &Post) -> String {
    match &post.excerpt {
        Some(excerpt) => excerpt.clone(),
        None => truncate(strip_html(&post.html).trim(), FALLBACK_EXCERPT_CHARS),
    }
}

/// Wrap in CDATA, splitting any `]]>` across sections
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}
