use async_trait::async_trait;

use crate::types::{Article, DailyArticles, FeedDescriptor, Tenant, TenantFeed};
use crate::Result;

/// Static artifacts of the primary pipeline.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Articles of the most recent published run, empty if there is none.
    async fn load_latest(&self) -> Result<Vec<Article>>;

    /// Write the run's articles, the feed catalog and the archive index entry.
    async fn publish(&self, daily: &DailyArticles, feeds: &[FeedDescriptor]) -> Result<()>;
}

/// Destination for a tenant's enriched articles, upserted by article id.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    async fn store(&self, articles: &[Article], tenant: &Tenant) -> Result<()>;
}

#[async_trait]
pub trait TenantStore: ArticleSink {
    /// Every tenant feed row joined with its owner's profile.
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>>;
}
