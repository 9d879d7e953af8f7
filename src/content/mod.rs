//! Content module - post models, front-matter, markdown and content sources

mod frontmatter;
pub mod markdown;
mod post;
pub mod source;

pub use frontmatter::{parse_date_string, FrontMatter, FrontMatterError, TagEntry};
pub use markdown::{MarkdownPipeline, PipelineBuilder, RenderedMarkdown, Stage, StageKind};
pub use post::{Author, FieldSet, Post, PostField, PostRecord, ReadingTime, Tag, TocEntry};
pub use source::{ContentSource, FileSystemSource, GhostClient, GhostSource};
