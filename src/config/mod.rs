//! Configuration module

mod site;

pub use site::AuthorConfig;
pub use site::AutolinkBehavior;
pub use site::FeedConfig;
pub use site::FeedContent;
pub use site::GhostConfig;
pub use site::MarkdownConfig;
pub use site::SiteConfig;
pub use site::SourceConfig;
pub use site::TagConfig;
pub use site::TagReconcile;
pub use site::ThumbnailConfig;
