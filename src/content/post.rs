//! Post, tag and author models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{AuthorConfig, TagConfig};
use crate::error::{SiteError, SiteResult};

/// A blog post with all derived fields filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// URL-safe identifier, unique across posts
    pub slug: String,

    pub title: String,

    /// Short summary used by listings and the feed
    pub excerpt: Option<String>,

    /// Publication date
    pub date: DateTime<FixedOffset>,

    /// Raw markdown (empty for CMS posts that only ship HTML)
    pub raw: String,

    /// Rendered HTML content
    pub html: String,

    pub tags: Vec<Tag>,

    pub reading_time: ReadingTime,

    pub author: Author,

    pub cover_image: Option<String>,

    /// Headings collected while rendering
    pub toc: Vec<TocEntry>,

    /// URL prefix for posts outside the main listing, e.g. `newsletter`
    #[serde(default)]
    pub section: Option<String>,
}

impl Post {
    /// Whether any of the post's tags has the given slug
    pub fn has_tag(&self, tag_slug: &str) -> bool {
        self.tags.iter().any(|t| t.slug == tag_slug)
    }

    /// Site-relative path of the post page
    pub fn path(&self) -> String {
        match &self.section {
            Some(section) => format!("/{}/{}/", section, self.slug),
            None => format!("/{}/", self.slug),
        }
    }

    /// Site-relative path of the pre-rendered Open Graph image
    pub fn og_image_path(&self) -> String {
        match &self.section {
            Some(section) => format!("og/{}/{}.png", section, self.slug),
            None => format!("og/{}.png", self.slug),
        }
    }

    /// Build a post from a record that was fetched with every field
    pub fn from_record(record: PostRecord) -> SiteResult<Self> {
        let slug = record.slug;
        let title = record
            .title
            .ok_or_else(|| SiteError::malformed(&slug, "missing required field `title`"))?;
        let date = record
            .date
            .ok_or_else(|| SiteError::malformed(&slug, "missing required field `date`"))?;

        Ok(Post {
            title,
            date,
            excerpt: record.excerpt,
            raw: record.content,
            html: record.html.unwrap_or_default(),
            tags: record.tags.unwrap_or_default(),
            reading_time: record.reading_time.unwrap_or_default(),
            author: record.author.unwrap_or_default(),
            cover_image: record.cover_image,
            toc: record.toc.unwrap_or_default(),
            section: None,
            slug,
        })
    }
}

/// A tag attached to posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub name: String,
    /// Accent colour for tag chips
    pub color: Option<String>,
    pub description: Option<String>,
}

impl Tag {
    /// Create a tag from a display name, slugifying it
    pub fn from_name(name: &str) -> Self {
        Self {
            slug: tag_slug(name),
            name: name.to_string(),
            color: None,
            description: None,
        }
    }

    /// Fill in missing display metadata from the tag registry
    pub fn enrich(mut self, registry: Option<&TagConfig>) -> Self {
        if let Some(entry) = registry {
            if !entry.name.is_empty() && (self.name.is_empty() || self.name == self.slug) {
                self.name = entry.name.clone();
            }
            if self.color.is_none() {
                self.color = entry.color.clone();
            }
            if self.description.is_none() {
                self.description = entry.description.clone();
            }
        }
        if self.name.is_empty() {
            self.name = self.slug.clone();
        }
        self
    }
}

/// Slug for a tag name; `+` and `#` are spelled out so `C++` and `C#` stay apart
pub fn tag_slug(name: &str) -> String {
    slug::slugify(name.replace('+', " plus ").replace('#', " sharp "))
}

/// Post author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Author {
    pub name: String,
    pub image: Option<String>,
    pub twitter: Option<String>,
}

impl From<&AuthorConfig> for Author {
    fn from(config: &AuthorConfig) -> Self {
        Self {
            name: config.name.clone(),
            image: config.image.clone(),
            twitter: config.twitter.clone(),
        }
    }
}

/// A table-of-contents entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Estimated reading time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadingTime {
    pub minutes: f64,
    pub words: usize,
}

impl ReadingTime {
    pub fn from_words(words: usize, words_per_minute: usize) -> Self {
        Self {
            minutes: words as f64 / words_per_minute.max(1) as f64,
            words,
        }
    }

    /// Display label, e.g. "4 min read"
    pub fn label(&self) -> String {
        format!("{} min read", self.minutes.ceil().max(1.0) as u64)
    }
}

/// A field that can be requested from a content source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PostField {
    Title,
    Date,
    Excerpt,
    Tags,
    Author,
    CoverImage,
    ReadTime,
    Html,
}

/// The set of fields to load; `slug` and `content` are always loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<PostField>);

impl FieldSet {
    pub fn all() -> Self {
        Self(
            [
                PostField::Title,
                PostField::Date,
                PostField::Excerpt,
                PostField::Tags,
                PostField::Author,
                PostField::CoverImage,
                PostField::ReadTime,
                PostField::Html,
            ]
            .into_iter()
            .collect(),
        )
    }

    pub fn only(fields: &[PostField]) -> Self {
        Self(fields.iter().copied().collect())
    }

    pub fn contains(&self, field: PostField) -> bool {
        self.0.contains(&field)
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::all()
    }
}

/// A post restricted to the requested fields
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostRecord {
    pub slug: String,
    /// Raw body, markdown or CMS HTML
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<ReadingTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<Vec<TocEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_slug_keeps_symbols_apart() {
        assert_eq!(tag_slug("C++"), "c-plus-plus");
        assert_eq!(tag_slug("C#"), "c-sharp");
        assert_eq!(tag_slug("Swift"), "swift");
        assert_eq!(tag_slug("!!!"), "");
    }

    #[test]
    fn test_tag_from_name() {
        let tag = Tag::from_name("Swift Package Manager");
        assert_eq!(tag.slug, "swift-package-manager");
        assert_eq!(tag.name, "Swift Package Manager");
    }

    #[test]
    fn test_tag_enrich_from_registry() {
        let registry = TagConfig {
            name: "SwiftUI".to_string(),
            color: Some("#9ca3af".to_string()),
            description: Some("Declarative UI".to_string()),
        };
        let tag = Tag {
            slug: "swiftui".to_string(),
            name: "swiftui".to_string(),
            color: None,
            description: None,
        }
        .enrich(Some(&registry));
        assert_eq!(tag.name, "SwiftUI");
        assert_eq!(tag.color.as_deref(), Some("#9ca3af"));

        // Explicit metadata on the post is not overwritten
        let tag = Tag {
            slug: "swiftui".to_string(),
            name: "Swift UI".to_string(),
            color: Some("red".to_string()),
            description: None,
        }
        .enrich(Some(&registry));
        assert_eq!(tag.name, "Swift UI");
        assert_eq!(tag.color.as_deref(), Some("red"));
    }

    #[test]
    fn test_reading_time_label() {
        assert_eq!(ReadingTime::from_words(0, 200).label(), "1 min read");
        assert_eq!(ReadingTime::from_words(450, 200).label(), "3 min read");
        assert!((ReadingTime::from_words(300, 200).minutes - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_record_requires_title_and_date() {
        let record = PostRecord {
            slug: "untitled".to_string(),
            ..Default::default()
        };
        let err = Post::from_record(record).unwrap_err();
        assert!(matches!(err, SiteError::MalformedFrontMatter { .. }));
    }

    #[test]
    fn test_field_set() {
        let fields = FieldSet::only(&[PostField::Title]);
        assert!(fields.contains(PostField::Title));
        assert!(!fields.contains(PostField::Tags));
        assert!(FieldSet::all().contains(PostField::Html));
    }
}
