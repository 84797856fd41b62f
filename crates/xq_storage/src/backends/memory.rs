use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use xq_core::{Article, ArticleSink, Result, Tenant, TenantFeed, TenantStore};

use crate::UserArticleRow;

/// Process-local tenant store, used for offline runs and tests.
#[derive(Clone)]
pub struct MemoryTenantStore {
    feeds: Arc<RwLock<Vec<TenantFeed>>>,
    rows: Arc<RwLock<BTreeMap<String, UserArticleRow>>>,
    content_cap: usize,
}

impl MemoryTenantStore {
    pub fn new(content_cap: usize) -> Self {
        Self {
            feeds: Arc::new(RwLock::new(Vec::new())),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            content_cap,
        }
    }

    pub fn with_feeds(content_cap: usize, feeds: Vec<TenantFeed>) -> Self {
        Self {
            feeds: Arc::new(RwLock::new(feeds)),
            ..Self::new(content_cap)
        }
    }

    /// Stored rows ordered by id.
    pub async fn rows(&self) -> Vec<UserArticleRow> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn rows_for(&self, user_id: &str) -> Vec<UserArticleRow> {
        self.rows
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ArticleSink for MemoryTenantStore {
    async fn store(&self, articles: &[Article], tenant: &Tenant) -> Result<()> {
        let mut rows = self.rows.write().await;
        for article in articles {
            let row = UserArticleRow::from_article(article, tenant, self.content_cap);
            rows.insert(row.id.clone(), row);
        }
        Ok(())
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>> {
        Ok(self.feeds.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xq_core::Tier;

    fn article(id: &str, summary: &str) -> Article {
        Article {
            id: id.to_string(),
            title: "Title".to_string(),
            url: format!("https://example.com/{}", id),
            author: String::new(),
            feed_title: "Blog".to_string(),
            category: "user-custom".to_string(),
            published_at: None,
            content: "body".to_string(),
            summary_zh: summary.to_string(),
            tags: vec!["Tools".to_string()],
            summary_long: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_upserts_by_id() {
        let tenant = Tenant {
            user_id: "u1".to_string(),
            custom_prompt: None,
            tier: Tier::Free,
        };
        let store = MemoryTenantStore::new(50_000);

        store.store(&[article("a", "first"), article("b", "b")], &tenant).await.unwrap();
        store.store(&[article("a", "second")], &tenant).await.unwrap();

        let rows = store.rows_for("u1").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].summary_zh, "second");
        assert!(store.rows_for("u2").await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_returns_seeded_feeds() {
        let feed = TenantFeed {
            user_id: "u1".to_string(),
            feed_url: "https://example.com/rss".to_string(),
            feed_title: None,
            custom_prompt: None,
            tier: Tier::Pro,
        };
        let store = MemoryTenantStore::with_feeds(100, vec![feed.clone()]);
        assert_eq!(store.load_tenant_feeds().await.unwrap(), vec![feed]);
    }
}
