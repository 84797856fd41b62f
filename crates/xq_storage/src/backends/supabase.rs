use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use url::Url;
use xq_core::{Article, ArticleSink, Error, Result, Tenant, TenantFeed, TenantStore, Tier};

use crate::UserArticleRow;

const FEEDS_SELECT: &str = "id,user_id,feed_url,feed_title,profiles(custom_ai_prompt,tier)";

/// Tenant store backed by a Supabase project's PostgREST endpoint.
pub struct SupabaseTenantStore {
    client: reqwest::Client,
    base: Url,
    content_cap: usize,
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    user_id: String,
    feed_url: String,
    #[serde(default)]
    feed_title: Option<String>,
    #[serde(default)]
    profiles: Value,
}

impl FeedRow {
    fn into_tenant_feed(self) -> TenantFeed {
        // The embedded profile is an object, or a one-element array on some schemas.
        let profile = match &self.profiles {
            Value::Array(items) => items.first(),
            Value::Object(_) => Some(&self.profiles),
            _ => None,
        };
        let custom_prompt = profile
            .and_then(|p| p.get("custom_ai_prompt"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let tier = profile
            .and_then(|p| p.get("tier"))
            .and_then(Value::as_str)
            .map(Tier::parse)
            .unwrap_or_default();
        TenantFeed {
            user_id: self.user_id,
            feed_url: self.feed_url,
            feed_title: self.feed_title,
            custom_prompt,
            tier,
        }
    }
}

impl SupabaseTenantStore {
    pub fn new(url: &str, service_key: &str, content_cap: usize) -> Result<Self> {
        let base = Url::parse(url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid SUPABASE_URL {}: {}", url, e)))?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(service_key)
            .map_err(|e| Error::Config(format!("Invalid SUPABASE_SERVICE_KEY: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", service_key))
            .map_err(|e| Error::Config(format!("Invalid SUPABASE_SERVICE_KEY: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base,
            content_cap,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.base
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| Error::Config(format!("Invalid Supabase table url: {}", e)))
    }

    async fn error_for(response: reqwest::Response, action: &str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::Storage(format!("Supabase {} failed with {}: {}", action, status, body))
    }
}

#[async_trait]
impl ArticleSink for SupabaseTenantStore {
    async fn store(&self, articles: &[Article], tenant: &Tenant) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }
        let rows: Vec<UserArticleRow> = articles
            .iter()
            .map(|a| UserArticleRow::from_article(a, tenant, self.content_cap))
            .collect();

        let mut url = self.table_url("user_articles")?;
        url.query_pairs_mut().append_pair("on_conflict", "id");
        let response = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, "upsert").await);
        }
        tracing::debug!("Upserted {} rows for {}", rows.len(), tenant.short_id());
        Ok(())
    }
}

#[async_trait]
impl TenantStore for SupabaseTenantStore {
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>> {
        let mut url = self.table_url("user_feeds")?;
        url.query_pairs_mut().append_pair("select", FEEDS_SELECT);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, "select").await);
        }
        let rows: Vec<FeedRow> = response.json().await?;
        Ok(rows.into_iter().map(FeedRow::into_tenant_feed).collect())
    }
}
