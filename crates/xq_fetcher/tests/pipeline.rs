use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tempfile::TempDir;
use xq_core::config::{PipelineConfig, SelectionConfig};
use xq_core::{
    ArchiveEntry, Article, ArticleSink, Error, FeedDescriptor, Result, StalePolicy, Tenant, TenantFeed,
    TenantStore, TextGenerator, Tier,
};
use xq_fetcher::{FeedFetcher, FeedResponse, FeedTransport, PipelineManager, TenantReport};
use xq_inference::models::DummyModel;
use xq_storage::{FileContentStore, MemoryTenantStore};

struct StaticTransport {
    documents: HashMap<String, (u16, String)>,
}

impl StaticTransport {
    fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    fn with(mut self, url: &str, status: u16, body: String) -> Self {
        self.documents.insert(url.to_string(), (status, body));
        self
    }
}

#[async_trait]
impl FeedTransport for StaticTransport {
    async fn get(&self, url: &str) -> Result<FeedResponse> {
        match self.documents.get(url) {
            Some((status, body)) => Ok(FeedResponse {
                status: *status,
                body: body.clone().into_bytes(),
            }),
            None => Err(Error::Feed(format!("connection refused: {}", url))),
        }
    }
}

fn rss(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link, date)| {
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
                 <description>about {}</description></item>",
                title, link, date, title
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>\
         <link>https://example.com</link><description>d</description>{}</channel></rss>",
        items
    )
}

fn feed(url: &str, category: &str) -> FeedDescriptor {
    FeedDescriptor {
        title: format!("Feed {}", url),
        xml_url: url.to_string(),
        html_url: String::new(),
        category: category.to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
}

fn config(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.content_dir = dir.path().to_path_buf();
    config.ai.retry_delay = std::time::Duration::ZERO;
    config
}

fn manager(
    config: PipelineConfig,
    transport: StaticTransport,
    model: Option<Arc<dyn TextGenerator>>,
    tenants: Option<Arc<dyn TenantStore>>,
) -> PipelineManager {
    let content = Arc::new(FileContentStore::new(config.content_dir.clone()));
    let fetcher = FeedFetcher::new(Arc::new(transport), 4);
    PipelineManager::new(config, fetcher, model, content, tenants)
}

fn read_json(dir: &TempDir, relative: &str) -> Value {
    serde_json::from_str(&std::fs::read_to_string(dir.path().join(relative)).unwrap()).unwrap()
}

fn global_transport() -> StaticTransport {
    StaticTransport::new()
        .with(
            "https://a.example/rss",
            200,
            rss(&[
                ("Recent A", "https://a.example/1", "Wed, 01 May 2024 20:00:00 GMT"),
                ("Old A", "https://a.example/0", "Mon, 01 Apr 2024 10:00:00 GMT"),
            ]),
        )
        .with("https://b.example/rss", 500, String::new())
        .with(
            "https://c.example/rss",
            200,
            rss(&[("Recent C", "https://c.example/1", "Wed, 01 May 2024 10:00:00 GMT")]),
        )
}

fn global_feeds() -> Vec<FeedDescriptor> {
    vec![
        feed("https://a.example/rss", "Tech / AI"),
        feed("https://b.example/rss", "Tech"),
        feed("https://c.example/rss", "Security"),
        feed("https://down.example/rss", "Tech"),
    ]
}

#[tokio::test]
async fn test_empty_feed_list_fails_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(config(&dir), StaticTransport::new(), None, None);

    let err = manager.run_primary_at(&[], now()).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_primary_run_publishes_recent_articles() {
    let dir = tempfile::tempdir().unwrap();
    let reply = r#"```json
{"articles": [
  {"index": 1, "summary_zh": "A 的摘要", "tags": ["AI/LLM/Agent", "Quantum"]},
  {"index": 2, "summary_zh": "C 的摘要", "tags": ["NotATag"]}
]}
```"#;
    let model = Arc::new(DummyModel::new().reply(reply, 1234));
    let manager = manager(config(&dir), global_transport(), Some(model.clone()), None);

    let report = manager.run_primary_at(&global_feeds(), now()).await.unwrap();

    assert_eq!(report.feeds, 4);
    assert_eq!(report.failed_feeds, 1);
    assert_eq!(report.fetched_posts, 3);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.tokens_used, 1234);
    assert!(!report.empty);
    assert_eq!(model.calls(), 1);

    let latest = read_json(&dir, "articles/latest.json");
    assert_eq!(latest["date"], "2024-05-02");
    assert_eq!(latest["article_count"], 2);
    assert_eq!(latest["ai_model"], "dummy");
    assert_eq!(latest["articles"][0]["title"], "Recent A");
    assert_eq!(latest["articles"][0]["tags"], serde_json::json!(["AI/LLM/Agent"]));
    assert_eq!(latest["articles"][0]["published_at"], "2024-05-01T20:00:00+00:00");
    assert_eq!(latest["articles"][1]["summary_zh"], "C 的摘要");
    assert_eq!(latest["articles"][1]["tags"], serde_json::json!(["Security"]));
    assert_eq!(read_json(&dir, "articles/2024-05-02.json"), latest);
    assert_eq!(read_json(&dir, "feeds.json")["count"], 4);

    let id = latest["articles"][0]["id"].as_str().unwrap();
    assert_eq!(id, xq_core::article_id("https://a.example/1"));
    assert_eq!(read_json(&dir, &format!("article-content/{}.json", id))["content"], "about Recent A");
}

#[tokio::test]
async fn test_rerun_on_same_day_keeps_one_index_entry() {
    let dir = tempfile::tempdir().unwrap();
    let reply = r#"[{"index": 1, "summary_zh": "x", "tags": ["AI"]}, {"index": 2, "summary_zh": "y", "tags": ["AI/LLM/RAG"]}]"#;
    let model = Arc::new(DummyModel::new().reply(reply, 10).reply(reply, 10));
    let manager = manager(config(&dir), global_transport(), Some(model.clone()), None);

    manager.run_primary_at(&global_feeds(), now()).await.unwrap();
    manager.run_primary_at(&global_feeds(), now()).await.unwrap();

    let index: xq_core::ArchiveIndex = serde_json::from_value(read_json(&dir, "index.json")).unwrap();
    assert_eq!(
        index.entries,
        vec![ArchiveEntry {
            date: now().date_naive(),
            article_count: 2
        }]
    );
    // The second run is seeded with the first run's subtags.
    assert!(!model.prompts()[0].contains("AI/LLM/RAG"));
    assert!(model.prompts()[1].contains("AI/LLM/RAG"));
}

#[tokio::test]
async fn test_no_posts_publishes_the_empty_record() {
    let dir = tempfile::tempdir().unwrap();
    let transport = StaticTransport::new().with("https://b.example/rss", 404, String::new());
    let manager = manager(config(&dir), transport, None, None);

    let report = manager
        .run_primary_at(&[feed("https://b.example/rss", "Tech")], now())
        .await
        .unwrap();

    assert!(report.empty);
    let latest = read_json(&dir, "articles/latest.json");
    assert_eq!(latest["article_count"], 0);
    assert_eq!(latest["notice"], xq_core::types::NO_NEW_ITEMS_NOTICE);
    assert_eq!(read_json(&dir, "index.json")["entries"][0]["article_count"], 0);
}

#[tokio::test]
async fn test_posts_without_model_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(config(&dir), global_transport(), None, None);

    let err = manager.run_primary_at(&global_feeds(), now()).await.unwrap_err();

    assert!(err.to_string().contains("SILICONFLOW_API_KEY"));
    assert!(!dir.path().join("articles/latest.json").exists());
}

#[tokio::test]
async fn test_stale_posts_follow_the_stale_policy() {
    let transport = || {
        StaticTransport::new().with(
            "https://old.example/rss",
            200,
            rss(&[("Old", "https://old.example/1", "Mon, 01 Apr 2024 10:00:00 GMT")]),
        )
    };
    let feeds = vec![feed("https://old.example/rss", "")];

    let dir = tempfile::tempdir().unwrap();
    let mut closed = config(&dir);
    closed.selection = SelectionConfig {
        stale_policy: StalePolicy::FailClosed,
        ..SelectionConfig::default()
    };
    let report = manager(closed, transport(), None, None)
        .run_primary_at(&feeds, now())
        .await
        .unwrap();
    assert!(report.empty);
    assert_eq!(report.candidates, 0);

    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(DummyModel::new().reply(r#"[{"index": 1, "summary_zh": "旧文", "tags": []}]"#, 5));
    let report = manager(config(&dir), transport(), Some(model), None)
        .run_primary_at(&feeds, now())
        .await
        .unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(read_json(&dir, "articles/latest.json")["articles"][0]["tags"], serde_json::json!(["Tools"]));
}

fn tenant_row(user: &str, url: &str, tier: Tier) -> TenantFeed {
    TenantFeed {
        user_id: user.to_string(),
        feed_url: url.to_string(),
        feed_title: None,
        custom_prompt: Some("只看 Rust".to_string()),
        tier,
    }
}

fn tenant_transport() -> StaticTransport {
    let items: Vec<(String, String, String)> = (0..60)
        .map(|i| {
            (
                format!("Post {}", i),
                format!("https://own.example/{}", i),
                format!("Wed, 01 May 2024 {:02}:{:02}:00 GMT", i / 60, i % 60),
            )
        })
        .collect();
    let refs: Vec<(&str, &str, &str)> = items
        .iter()
        .map(|(t, l, d)| (t.as_str(), l.as_str(), d.as_str()))
        .collect();
    global_transport().with("https://own.example/rss", 200, rss(&refs))
}

#[tokio::test]
async fn test_tenants_without_model_get_title_and_catch_all() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTenantStore::with_feeds(
        50_000,
        vec![
            tenant_row("overlap-user", "HTTPS://A.EXAMPLE/RSS/", Tier::Free),
            tenant_row("own-user", "https://own.example/rss", Tier::Pro),
        ],
    ));
    let manager = manager(config(&dir), tenant_transport(), None, Some(store.clone()));

    let report = manager.run_tenants(&global_feeds()).await.unwrap();

    assert_eq!(report.tenants, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.articles_written, 50);
    assert!(store.rows_for("overlap-user").await.is_empty());

    let rows = store.rows_for("own-user").await;
    assert_eq!(rows.len(), 50);
    assert!(rows.iter().all(|r| r.summary_zh == r.title));
    assert!(rows.iter().all(|r| r.tags == vec!["Tools".to_string()]));
    assert!(rows.iter().all(|r| r.summary_long.is_none()));
    // The ten oldest posts fall outside the newest 50.
    assert!(!rows.iter().any(|r| r.title == "Post 9"));
    assert!(rows.iter().any(|r| r.title == "Post 10"));
}

#[tokio::test]
async fn test_pro_tenant_gets_custom_prompt_and_long_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryTenantStore::with_feeds(
        50_000,
        vec![tenant_row("pro-user", "https://c.example/rss", Tier::Pro)],
    ));
    let model = Arc::new(
        DummyModel::new()
            .reply(r#"[{"index": 1, "summary_zh": "定制摘要", "tags": ["Programming/Rust"]}]"#, 40)
            .reply("这是一篇深度摘要。", 300),
    );
    let manager = manager(config(&dir), global_transport(), Some(model.clone()), Some(store.clone()));

    let report = manager.run_tenants(&[]).await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.tokens_used, 340);
    assert!(model.prompts()[0].starts_with("读者的个性化要求：只看 Rust"));

    let rows = store.rows_for("pro-user").await;
    assert_eq!(rows[0].summary_zh, "定制摘要");
    assert_eq!(rows[0].tags, vec!["Programming/Rust"]);
    assert_eq!(rows[0].summary_long.as_deref(), Some("这是一篇深度摘要。"));
    assert_eq!(rows[0].published_at.as_deref(), Some("2024-05-01T10:00:00+00:00"));
}

/// Rejects writes for one user and delegates everything else.
struct RejectingStore {
    inner: MemoryTenantStore,
    reject_user: String,
}

#[async_trait]
impl ArticleSink for RejectingStore {
    async fn store(&self, articles: &[Article], tenant: &Tenant) -> Result<()> {
        if tenant.user_id == self.reject_user {
            return Err(Error::Storage("permission denied".to_string()));
        }
        self.inner.store(articles, tenant).await
    }
}

#[async_trait]
impl TenantStore for RejectingStore {
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>> {
        self.inner.load_tenant_feeds().await
    }
}

#[tokio::test]
async fn test_failing_tenant_does_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    let inner = MemoryTenantStore::with_feeds(
        50_000,
        vec![
            tenant_row("a-user", "https://c.example/rss", Tier::Free),
            tenant_row("b-user", "https://a.example/rss", Tier::Free),
        ],
    );
    let store = Arc::new(RejectingStore {
        inner: inner.clone(),
        reject_user: "a-user".to_string(),
    });
    let manager = manager(config(&dir), global_transport(), None, Some(store));

    let report = manager.run_tenants(&[]).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 1);
    assert!(inner.rows_for("a-user").await.is_empty());
    assert_eq!(inner.rows_for("b-user").await.len(), 2);
}

/// A tenant store whose backend is down.
struct UnreachableStore;

#[async_trait]
impl ArticleSink for UnreachableStore {
    async fn store(&self, _articles: &[Article], _tenant: &Tenant) -> Result<()> {
        Err(Error::Storage("connection refused".to_string()))
    }
}

#[async_trait]
impl TenantStore for UnreachableStore {
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>> {
        Err(Error::Storage("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_unreachable_tenant_store_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(
        config(&dir),
        global_transport(),
        None,
        Some(Arc::new(UnreachableStore)),
    );

    let report = manager.run_tenants(&global_feeds()).await.unwrap();

    assert_eq!(report, TenantReport::default());
}

#[tokio::test]
async fn test_tenant_flow_is_a_no_op_without_store() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(config(&dir), StaticTransport::new(), None, None);
    assert_eq!(manager.run_tenants(&[]).await.unwrap(), TenantReport::default());
}
