//! List site content

use anyhow::Result;
use indexmap::IndexMap;

use crate::aggregate::Collection;
use crate::content::Tag;
use crate::Site;

/// List site content by type
pub async fn run(site: &Site, content_type: &str) -> Result<()> {
    let collection = site.aggregator()?.collect().await?;

    match content_type {
        "post" | "posts" => {
            println!("Posts ({}):", collection.posts.len());
            for post in &collection.posts {
                println!(
                    "  {} - {} [{}] {}",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.slug,
                    post.reading_time.label()
                );
            }
        }
        "tag" | "tags" => {
            let tags = tag_counts(&collection);
            println!("Tags ({}):", tags.len());
            for (tag, count) in tags {
                println!("  {} [{}] ({})", tag.name, tag.slug, count);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, tag", content_type);
        }
    }

    Ok(())
}

/// Tags with their post counts, most used first
pub fn tag_counts(collection: &Collection) -> Vec<(Tag, usize)> {
    let mut counts: IndexMap<&str, (Tag, usize)> = collection
        .tags
        .iter()
        .map(|t| (t.slug.as_str(), (t.clone(), 0)))
        .collect();
    for tag in collection.posts.iter().flat_map(|p| p.tags.iter()) {
        if let Some((_, count)) = counts.get_mut(tag.slug.as_str()) {
            *count += 1;
        }
    }

    let mut tags: Vec<_> = counts.into_values().collect();
    // Stable, so equally used tags keep listing order
    tags.sort_by(|a, b| b.1.cmp(&a.1));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Author, Post, ReadingTime};
    use chrono::DateTime;

    fn post(tags: &[&str]) -> Post {
        Post {
            slug: "p".to_string(),
            title: "P".to_string(),
            excerpt: None,
            date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            raw: String::new(),
            html: String::new(),
            tags: tags.iter().map(|t| Tag::from_name(t)).collect(),
            reading_time: ReadingTime::default(),
            author: Author::default(),
            cover_image: None,
            toc: Vec::new(),
            section: None,
        }
    }

    #[test]
    fn test_tag_counts() {
        let collection = Collection {
            posts: vec![post(&["CI", "Swift"]), post(&["Swift"]), post(&["Rust"])],
            tags: vec![Tag::from_name("CI"), Tag::from_name("Swift"), Tag::from_name("Rust")],
        };
        let counts: Vec<_> = tag_counts(&collection)
            .into_iter()
            .map(|(t, n)| (t.slug, n))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("swift".to_string(), 2),
                ("ci".to_string(), 1),
                ("rust".to_string(), 1)
            ]
        );
    }
}
