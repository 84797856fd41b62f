use std::sync::Arc;

use serde::{Deserialize, Serialize};
use xq_core::config::TenantConfig;
use xq_core::types::format_timestamp;
use xq_core::{truncate_chars, Article, Result, Tenant, TenantBackend, TenantStore};

pub mod backends;

pub use backends::*;

/// One row of the tenant article table, upserted by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserArticleRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub feed_title: String,
    pub summary_zh: String,
    pub summary_long: Option<String>,
    pub tags: Vec<String>,
    pub content_html: String,
    pub published_at: Option<String>,
}

impl UserArticleRow {
    pub fn from_article(article: &Article, tenant: &Tenant, content_cap: usize) -> Self {
        Self {
            id: article.id.clone(),
            user_id: tenant.user_id.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            feed_title: article.feed_title.clone(),
            summary_zh: article.summary_zh.clone(),
            summary_long: article.summary_long.clone().filter(|s| !s.is_empty()),
            tags: article.tags.clone(),
            content_html: truncate_chars(&article.content, content_cap).to_string(),
            published_at: article.published_at.as_ref().map(format_timestamp),
        }
    }
}

/// Builds the configured tenant store. Missing credentials mean the tenant
/// flow is disabled, which is not an error.
pub async fn create_tenant_store(config: &TenantConfig) -> Result<Option<Arc<dyn TenantStore>>> {
    match config.backend {
        TenantBackend::None => Ok(None),
        TenantBackend::Memory => Ok(Some(Arc::new(MemoryTenantStore::new(config.content_cap)))),
        TenantBackend::Sqlite => sqlite_store(config).await,
        TenantBackend::Supabase => {
            let url = config.supabase_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
            let key = config.supabase_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
            match (url, key) {
                (Some(url), Some(key)) => Ok(Some(Arc::new(SupabaseTenantStore::new(
                    url,
                    key,
                    config.content_cap,
                )?))),
                _ => {
                    tracing::info!("SUPABASE_URL/SUPABASE_SERVICE_KEY not set, skipping user feeds");
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(feature = "sqlite")]
async fn sqlite_store(config: &TenantConfig) -> Result<Option<Arc<dyn TenantStore>>> {
    let store = SqliteTenantStore::new_with_path(&config.sqlite_path, config.content_cap).await?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "sqlite"))]
async fn sqlite_store(_config: &TenantConfig) -> Result<Option<Arc<dyn TenantStore>>> {
    Err(xq_core::Error::Config(
        "SQLite tenant store requested but xq_storage was built without the sqlite feature".to_string(),
    ))
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_tenant_store, UserArticleRow};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use xq_core::Tier;

    fn article(content: &str) -> Article {
        Article {
            id: "0123456789abcdef".to_string(),
            title: "Title".to_string(),
            url: "https://example.com/a".to_string(),
            author: String::new(),
            feed_title: "Blog".to_string(),
            category: "user-custom".to_string(),
            published_at: None,
            content: content.to_string(),
            summary_zh: "摘要".to_string(),
            tags: vec!["Tools".to_string()],
            summary_long: Some(String::new()),
        }
    }

    fn tenant() -> Tenant {
        Tenant {
            user_id: "user-1".to_string(),
            custom_prompt: None,
            tier: Tier::Free,
        }
    }

    #[test]
    fn test_row_caps_content_and_nulls_missing_fields() {
        let row = UserArticleRow::from_article(&article(&"文".repeat(60)), &tenant(), 50);
        assert_eq!(row.content_html.chars().count(), 50);
        assert_eq!(row.summary_long, None);
        assert_eq!(row.published_at, None);

        let json = serde_json::to_value(&row).unwrap();
        assert!(json["published_at"].is_null());
        assert!(json["summary_long"].is_null());
        assert_eq!(json["user_id"], "user-1");
    }

    #[test]
    fn test_row_formats_timestamp() {
        let mut a = article("body");
        a.published_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        let row = UserArticleRow::from_article(&a, &tenant(), 50_000);
        assert_eq!(row.published_at.as_deref(), Some("2024-05-01T08:00:00+00:00"));
    }

    #[tokio::test]
    async fn test_create_tenant_store_disabled_without_credentials() {
        let mut config = TenantConfig::default();
        assert!(create_tenant_store(&config).await.unwrap().is_none());

        config.backend = TenantBackend::Supabase;
        config.supabase_url = Some("https://project.supabase.co".to_string());
        assert!(create_tenant_store(&config).await.unwrap().is_none());

        config.supabase_key = Some("service-key".to_string());
        assert!(create_tenant_store(&config).await.unwrap().is_some());

        config.backend = TenantBackend::Memory;
        assert!(create_tenant_store(&config).await.unwrap().is_some());
    }
}
