use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use xq_core::{Article, ArticleSink, Error, Result, Tenant, TenantFeed, TenantStore, Tier};

use crate::UserArticleRow;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        custom_ai_prompt TEXT,
        tier TEXT NOT NULL DEFAULT 'free'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        feed_url TEXT NOT NULL,
        feed_title TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_articles (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        feed_title TEXT NOT NULL,
        summary_zh TEXT NOT NULL,
        summary_long TEXT,
        tags TEXT NOT NULL,
        content_html TEXT NOT NULL,
        published_at TEXT
    )
    "#,
];

fn storage_error(action: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("Failed to {}: {}", action, e))
}

/// Tenant store in a local SQLite file with the same table layout as the hosted one.
pub struct SqliteTenantStore {
    pool: SqlitePool,
    db_path: PathBuf,
    content_cap: usize,
}

impl SqliteTenantStore {
    pub async fn new_with_path(db_path: &Path, content_cap: usize) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| storage_error("connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| storage_error(&format!("run migration {}", i), e))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
            content_cap,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Registers a feed for a user; used to seed local runs.
    pub async fn add_feed(&self, user_id: &str, feed_url: &str, feed_title: Option<&str>) -> Result<()> {
        sqlx::query("INSERT INTO user_feeds (user_id, feed_url, feed_title) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(feed_url)
            .bind(feed_title)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("add feed", e))?;
        Ok(())
    }

    pub async fn set_profile(&self, user_id: &str, custom_prompt: Option<&str>, tier: Tier) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, custom_ai_prompt, tier) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                custom_ai_prompt = excluded.custom_ai_prompt,
                tier = excluded.tier
            "#,
        )
        .bind(user_id)
        .bind(custom_prompt)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("set profile", e))?;
        Ok(())
    }

    pub async fn articles_for(&self, user_id: &str) -> Result<Vec<UserArticleRow>> {
        let rows = sqlx::query("SELECT * FROM user_articles WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("load articles", e))?;
        rows.iter().map(article_row).collect()
    }
}

fn article_row(row: &SqliteRow) -> Result<UserArticleRow> {
    let get = |column: &str| -> Result<String> {
        row.try_get::<String, _>(column)
            .map_err(|e| storage_error(&format!("read column {}", column), e))
    };
    let get_opt = |column: &str| -> Result<Option<String>> {
        row.try_get::<Option<String>, _>(column)
            .map_err(|e| storage_error(&format!("read column {}", column), e))
    };
    Ok(UserArticleRow {
        id: get("id")?,
        user_id: get("user_id")?,
        title: get("title")?,
        url: get("url")?,
        feed_title: get("feed_title")?,
        summary_zh: get("summary_zh")?,
        summary_long: get_opt("summary_long")?,
        tags: serde_json::from_str(&get("tags")?)?,
        content_html: get("content_html")?,
        published_at: get_opt("published_at")?,
    })
}

#[async_trait]
impl ArticleSink for SqliteTenantStore {
    async fn store(&self, articles: &[Article], tenant: &Tenant) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("begin transaction", e))?;

        for article in articles {
            let row = UserArticleRow::from_article(article, tenant, self.content_cap);
            sqlx::query(
                r#"
                INSERT INTO user_articles
                (id, user_id, title, url, feed_title, summary_zh, summary_long, tags, content_html, published_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    title = excluded.title,
                    url = excluded.url,
                    feed_title = excluded.feed_title,
                    summary_zh = excluded.summary_zh,
                    summary_long = excluded.summary_long,
                    tags = excluded.tags,
                    content_html = excluded.content_html,
                    published_at = excluded.published_at
                "#,
            )
            .bind(&row.id)
            .bind(&row.user_id)
            .bind(&row.title)
            .bind(&row.url)
            .bind(&row.feed_title)
            .bind(&row.summary_zh)
            .bind(row.summary_long.as_deref())
            .bind(serde_json::to_string(&row.tags)?)
            .bind(&row.content_html)
            .bind(row.published_at.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("store article", e))?;
        }

        tx.commit().await.map_err(|e| storage_error("commit articles", e))?;
        Ok(())
    }
}

#[async_trait]
impl TenantStore for SqliteTenantStore {
    async fn load_tenant_feeds(&self) -> Result<Vec<TenantFeed>> {
        let rows = sqlx::query(
            r#"
            SELECT f.user_id, f.feed_url, f.feed_title, p.custom_ai_prompt, p.tier
            FROM user_feeds f
            LEFT JOIN profiles p ON p.id = f.user_id
            ORDER BY f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("load tenant feeds", e))?;

        rows.iter()
            .map(|row| -> Result<TenantFeed> {
                let read = |column: &str| {
                    row.try_get::<Option<String>, _>(column)
                        .map_err(|e| storage_error(&format!("read column {}", column), e))
                };
                Ok(TenantFeed {
                    user_id: read("user_id")?.unwrap_or_default(),
                    feed_url: read("feed_url")?.unwrap_or_default(),
                    feed_title: read("feed_title")?,
                    custom_prompt: read("custom_ai_prompt")?,
                    tier: read("tier")?.as_deref().map(Tier::parse).unwrap_or_default(),
                })
            })
            .collect()
    }
}
