use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use xq_core::recency::{select_candidates, sort_newest_first};
use xq_core::types::normalize_feed_url;
use xq_core::{
    ContentStore, DailyArticles, Error, FeedDescriptor, PipelineConfig, Result, TenantFeed,
    TenantStore, TextGenerator, Tier,
};
use xq_inference::{try_create_model, BatchSummarizer, LongformWriter, Vocabulary};
use xq_storage::{create_tenant_store, FileContentStore};

use crate::fetcher::FeedFetcher;
use crate::logging::Logger;

/// Outcome of one primary run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub feeds: usize,
    pub failed_feeds: usize,
    pub fetched_posts: usize,
    pub candidates: usize,
    pub articles: usize,
    pub failed_batches: usize,
    pub tokens_used: u64,
    /// True when the "no new items" record was published.
    pub empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantReport {
    pub tenants: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub articles_written: usize,
    pub tokens_used: u64,
}

enum TenantOutcome {
    Skipped,
    Written { articles: usize, tokens: u64 },
}

/// Wires fetcher, model and stores together for the two pipeline flows.
pub struct PipelineManager {
    config: PipelineConfig,
    fetcher: FeedFetcher,
    model: Option<Arc<dyn TextGenerator>>,
    content: Arc<dyn ContentStore>,
    tenants: Option<Arc<dyn TenantStore>>,
}

impl PipelineManager {
    pub fn new(
        config: PipelineConfig,
        fetcher: FeedFetcher,
        model: Option<Arc<dyn TextGenerator>>,
        content: Arc<dyn ContentStore>,
        tenants: Option<Arc<dyn TenantStore>>,
    ) -> Self {
        Self {
            config,
            fetcher,
            model,
            content,
            tenants,
        }
    }

    /// Production wiring: HTTP transport, the configured model if a key is
    /// present, static files under `content_dir` and the configured tenant store.
    pub async fn from_config(config: PipelineConfig) -> Result<Self> {
        let fetcher = FeedFetcher::from_config(&config.fetch)?;
        let model = try_create_model(&config.ai);
        let content = Arc::new(FileContentStore::new(config.content_dir.clone()));
        let tenants = create_tenant_store(&config.tenants).await?;
        Ok(Self::new(config, fetcher, model, content, tenants))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn model_id(&self) -> String {
        self.model
            .as_ref()
            .map(|m| m.model_id().to_string())
            .unwrap_or_else(|| self.config.ai.model.clone())
    }

    fn vocabulary(&self) -> Vocabulary {
        Vocabulary::new(self.config.tags)
    }

    pub async fn run_primary(&self, feeds: &[FeedDescriptor]) -> Result<RunReport> {
        self.run_primary_at(feeds, Utc::now()).await
    }

    /// Fetch, select, summarize and publish. Fails only when there are no
    /// feeds, or when there are posts to summarize but no model.
    pub async fn run_primary_at(&self, feeds: &[FeedDescriptor], now: DateTime<Utc>) -> Result<RunReport> {
        if feeds.is_empty() {
            return Err(Error::Config("No feeds found in the feed list".to_string()));
        }
        tracing::info!("📚 Fetching {} feeds", feeds.len());

        let fetched = self.fetcher.fetch_all(feeds).await;
        let mut report = RunReport {
            date: now.date_naive(),
            feeds: feeds.len(),
            failed_feeds: fetched.failed,
            fetched_posts: fetched.posts.len(),
            candidates: 0,
            articles: 0,
            failed_batches: 0,
            tokens_used: 0,
            empty: false,
        };

        if fetched.posts.is_empty() {
            tracing::warn!("No posts fetched, publishing an empty record");
            return self.publish_empty(feeds, report).await;
        }

        let selection = select_candidates(&fetched.posts, now, &self.config.selection);
        if selection.fell_back {
            tracing::warn!(
                "No posts within the last {}h, stale policy {:?} applied",
                self.config.selection.window.as_secs() / 3600,
                self.config.selection.stale_policy
            );
        }
        tracing::info!(
            "🗂️ {} recent posts, {} candidates",
            selection.recent_count,
            selection.candidates.len()
        );
        report.candidates = selection.candidates.len();
        if selection.candidates.is_empty() {
            return self.publish_empty(feeds, report).await;
        }

        let model = self.model.clone().ok_or_else(|| {
            Error::Config("SILICONFLOW_API_KEY is not configured but there are posts to summarize".to_string())
        })?;

        let prior = match self.content.load_latest().await {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!("Could not read the previous run, starting without known subtags: {}", e);
                Vec::new()
            }
        };

        let summarizer = BatchSummarizer::new(model.clone(), self.vocabulary(), self.config.ai.clone());
        let summarized = summarizer.summarize_all(&selection.candidates, None, &prior).await;

        report.articles = summarized.articles.len();
        report.failed_batches = summarized.failed_batches;
        report.tokens_used = summarized.tokens_used;

        let daily = DailyArticles::new(report.date, model.model_id(), summarized.articles, summarized.tokens_used);
        self.content.publish(&daily, feeds).await?;
        tracing::info!(
            "✅ Published {} articles for {} ({} tokens)",
            report.articles,
            report.date,
            report.tokens_used
        );
        Ok(report)
    }

    async fn publish_empty(&self, feeds: &[FeedDescriptor], mut report: RunReport) -> Result<RunReport> {
        let daily = DailyArticles::empty(report.date, &self.model_id());
        self.content.publish(&daily, feeds).await?;
        report.empty = true;
        Ok(report)
    }

    /// Processes every tenant independently. One tenant's failure is logged
    /// and does not stop the others; an unreachable store skips the flow.
    pub async fn run_tenants(&self, global_feeds: &[FeedDescriptor]) -> Result<TenantReport> {
        let mut report = TenantReport::default();
        let Some(store) = self.tenants.as_ref() else {
            tracing::info!("No tenant store configured, skipping user feeds");
            return Ok(report);
        };

        let rows = match store.load_tenant_feeds().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Could not load user feeds, skipping: {}", e);
                return Ok(report);
            }
        };
        if rows.is_empty() {
            tracing::info!("No user feeds to process");
            return Ok(report);
        }

        let global: HashSet<String> = global_feeds.iter().map(|f| normalize_feed_url(&f.xml_url)).collect();
        let mut by_user: BTreeMap<String, Vec<TenantFeed>> = BTreeMap::new();
        for row in rows {
            by_user.entry(row.user_id.clone()).or_default().push(row);
        }
        report.tenants = by_user.len();
        tracing::info!("👥 Processing feeds for {} users", report.tenants);

        for rows in by_user.values() {
            let tenant = rows[0].tenant();
            let logger = Logger::new().with_prefix(format!("User {}:", tenant.short_id()));
            match self.process_tenant(store.as_ref(), rows, &global, &logger).await {
                Ok(TenantOutcome::Skipped) => report.skipped += 1,
                Ok(TenantOutcome::Written { articles, tokens }) => {
                    report.processed += 1;
                    report.articles_written += articles;
                    report.tokens_used += tokens;
                }
                Err(e) => {
                    report.failed += 1;
                    logger.error(&format!("processing failed: {}", e));
                }
            }
        }
        Ok(report)
    }

    async fn process_tenant(
        &self,
        store: &dyn TenantStore,
        rows: &[TenantFeed],
        global: &HashSet<String>,
        logger: &Logger,
    ) -> Result<TenantOutcome> {
        let tenant = rows[0].tenant();

        let mut seen = HashSet::new();
        let unique: Vec<FeedDescriptor> = rows
            .iter()
            .filter(|row| {
                let key = normalize_feed_url(&row.feed_url);
                !global.contains(&key) && seen.insert(key)
            })
            .map(TenantFeed::descriptor)
            .collect();
        if unique.is_empty() {
            logger.info("all feeds overlap with global, skipping");
            return Ok(TenantOutcome::Skipped);
        }
        logger.info(&format!("fetching {} unique feeds", unique.len()));

        let mut posts = self.fetcher.fetch_all(&unique).await.posts;
        if posts.is_empty() {
            logger.info("no posts fetched");
            return Ok(TenantOutcome::Skipped);
        }
        sort_newest_first(&mut posts);
        posts.truncate(self.config.tenants.max_posts);
        logger.debug(&format!("keeping the newest {} posts", posts.len()));

        let (mut articles, mut tokens) = match &self.model {
            Some(model) => {
                let summarizer = BatchSummarizer::new(model.clone(), self.vocabulary(), self.config.ai.clone());
                let summarized = summarizer
                    .summarize_all(&posts, tenant.custom_prompt.as_deref(), &[])
                    .await;
                (summarized.articles, summarized.tokens_used)
            }
            None => {
                logger.warn("AI API not configured, skipping summarization");
                (BatchSummarizer::fallback_articles(&self.vocabulary(), &posts), 0)
            }
        };

        if tenant.tier == Tier::Pro {
            match &self.model {
                Some(model) => {
                    tokens += LongformWriter::new(model.clone(), &self.config.ai)
                        .enrich(&mut articles)
                        .await;
                }
                None => logger.warn("AI API not configured, skipping long summaries"),
            }
        }

        store.store(&articles, &tenant).await?;
        logger.info(&format!(
            "wrote {} articles (tier={})",
            articles.len(),
            tenant.tier.as_str()
        ));
        Ok(TenantOutcome::Written {
            articles: articles.len(),
            tokens,
        })
    }
}
