//! Front-matter parsing

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::post::{tag_slug, Author, Tag};
use crate::config::SiteConfig;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("invalid YAML front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON front-matter: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unterminated front-matter block")]
    Unterminated,
}

/// Accepts either a single value or a list of values
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

/// A tag as written in front-matter: a bare name or a full record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        slug: Option<String>,
        #[serde(default, alias = "accent_color")]
        color: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl TagEntry {
    pub fn into_tag(self) -> Tag {
        match self {
            TagEntry::Name(name) => Tag::from_name(&name),
            TagEntry::Full {
                name,
                slug,
                color,
                description,
            } => Tag {
                slug: slug.unwrap_or_else(|| tag_slug(&name)),
                name,
                color,
                description,
            },
        }
    }
}

/// An author as written in front-matter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default, alias = "picture")]
        image: Option<String>,
        #[serde(default)]
        twitter: Option<String>,
    },
}

impl From<AuthorEntry> for Author {
    fn from(entry: AuthorEntry) -> Self {
        match entry {
            AuthorEntry::Name(name) => Author {
                name,
                ..Default::default()
            },
            AuthorEntry::Full {
                name,
                image,
                twitter,
            } => Author {
                name,
                image,
                twitter,
            },
        }
    }
}

/// Front-matter data from a post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    #[serde(alias = "pubDate")]
    pub date: Option<String>,
    pub excerpt: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<TagEntry>,
    pub author: Option<AuthorEntry>,
    #[serde(alias = "coverImage")]
    pub cover_image: Option<String>,
    /// Reading time override in minutes
    #[serde(alias = "readTime")]
    pub readtime: Option<f64>,
    pub published: bool,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            date: None,
            excerpt: None,
            tags: Vec::new(),
            author: None,
            cover_image: None,
            readtime: None,
            published: true,
            extra: HashMap::new(),
        }
    }
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let content = content.trim_start();

        if content.starts_with("---") {
            return Self::parse_yaml(content);
        }

        if content.starts_with(";;;") || content.starts_with('{') {
            return Self::parse_json(content);
        }

        Ok((FrontMatter::default(), content))
    }

    fn parse_yaml(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let rest = content[3..].trim_start_matches(['\n', '\r']);

        let Some(end_pos) = rest.find("\n---") else {
            return Ok((FrontMatter::default(), content));
        };

        let yaml_content = &rest[..end_pos];
        let remaining = rest[end_pos + 4..].trim_start_matches(['\n', '\r']);

        if yaml_content.trim().is_empty() {
            return Ok((FrontMatter::default(), remaining));
        }

        // A thematic break followed by prose is not front-matter
        if !yaml_content.lines().any(looks_like_yaml_key) {
            return Ok((FrontMatter::default(), content));
        }

        let fm = serde_yaml::from_str::<FrontMatter>(yaml_content)?;
        Ok((fm, remaining))
    }

    fn parse_json(content: &str) -> Result<(Self, &str), FrontMatterError> {
        if let Some(rest) = content.strip_prefix(";;;") {
            let end_pos = rest.find(";;;").ok_or(FrontMatterError::Unterminated)?;
            let fm: FrontMatter = serde_json::from_str(&rest[..end_pos])?;
            let remaining = rest[end_pos + 3..].trim_start_matches(['\n', '\r']);
            return Ok((fm, remaining));
        }

        let mut depth = 0usize;
        let mut end_pos = None;
        for (i, c) in content.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end_pos = Some(i + 1);
                        break;
                    }
                }
                _ => {}
            }
        }

        let end_pos = end_pos.ok_or(FrontMatterError::Unterminated)?;
        let fm: FrontMatter = serde_json::from_str(&content[..end_pos])?;
        let remaining = content[end_pos..].trim_start_matches(['\n', '\r']);
        Ok((fm, remaining))
    }

    /// Parse the date, interpreting naive dates in the site timezone
    pub fn parse_date(&self, config: &SiteConfig) -> Option<DateTime<FixedOffset>> {
        self.date
            .as_deref()
            .and_then(|s| parse_date_string(s, config))
    }
}

/// `key: value` or `key:` on a line, with a plain identifier key
fn looks_like_yaml_key(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let Some(colon_pos) = trimmed.find(':') else {
        return false;
    };
    let key = &trimmed[..colon_pos];
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "http" | "https" | "ftp");
    let after = &trimmed[colon_pos + 1..];
    valid_key && (after.is_empty() || after.starts_with(' '))
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str, config: &SiteConfig) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    const DATETIME_FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return config.localize(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return config.localize(d.and_hms_opt(0, 0, 0)?);
        }
    }

    None
}
