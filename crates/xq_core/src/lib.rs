pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod recency;
pub mod storage;
pub mod types;

pub use config::{PipelineConfig, StalePolicy, TagPolicy, TenantBackend};
pub use error::Error;
pub use identity::article_id;
pub use models::{Completion, CompletionRequest, TextGenerator};
pub use storage::{ArticleSink, ContentStore, TenantStore};
pub use types::{
    ArchiveEntry, ArchiveIndex, Article, DailyArticles, FeedDescriptor, Post, Tenant, TenantFeed,
    Tier,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
