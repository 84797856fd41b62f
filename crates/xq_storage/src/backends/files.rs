use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use xq_core::types::format_timestamp;
use xq_core::{
    ArchiveEntry, ArchiveIndex, Article, ContentStore, DailyArticles, Error, FeedDescriptor, Result,
};

/// Static site content: per-day article lists, a Markdown rendering,
/// per-article content files, the feed catalog and the archive index.
#[derive(Debug, Clone)]
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.root.join("articles")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("article-content")
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub async fn load_index(&self) -> Result<ArchiveIndex> {
        let path = self.index_path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(ArchiveIndex::default());
        }
        let raw: Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
        Ok(read_index(raw))
    }

    async fn update_index(&self, date: NaiveDate, article_count: usize) -> Result<()> {
        let mut index = self.load_index().await?;
        index.record(ArchiveEntry { date, article_count });
        write_json(&self.index_path(), &index).await?;
        tracing::info!("Updated archive index: {} entries", index.entries.len());
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn load_latest(&self) -> Result<Vec<Article>> {
        let path = self.articles_dir().join("latest.json");
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let daily: DailyArticles = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
        Ok(daily.articles)
    }

    async fn publish(&self, daily: &DailyArticles, feeds: &[FeedDescriptor]) -> Result<()> {
        let articles_dir = self.articles_dir();
        let content_dir = self.content_dir();
        tokio::fs::create_dir_all(&articles_dir).await?;
        tokio::fs::create_dir_all(&content_dir).await?;

        let dated = articles_dir.join(format!("{}.json", daily.date));
        write_json(&dated, daily).await?;
        tracing::info!("Wrote {}", dated.display());

        write_json(&articles_dir.join("latest.json"), daily).await?;

        let markdown = articles_dir.join(format!("{}.md", daily.date));
        write_atomic(&markdown, render_markdown(daily).as_bytes()).await?;

        for article in &daily.articles {
            let body = json!({
                "id": article.id,
                "title": article.title,
                "url": article.url,
                "content": article.content,
            });
            write_json(&content_dir.join(format!("{}.json", article.id)), &body).await?;
        }

        let catalog = json!({
            "count": feeds.len(),
            "updated_at": daily.date.to_string(),
            "feeds": feeds,
        });
        write_json(&self.root.join("feeds.json"), &catalog).await?;
        tracing::info!("Wrote feed catalog with {} feeds", feeds.len());

        self.update_index(daily.date, daily.article_count).await
    }
}

/// Accepts the current `entries` shape and the legacy `digests` one.
fn read_index(mut raw: Value) -> ArchiveIndex {
    let entries = match raw.get_mut("entries").map(Value::take) {
        Some(entries) => entries,
        None => raw.get_mut("digests").map(Value::take).unwrap_or(Value::Null),
    };

    let mut index = ArchiveIndex::default();
    for entry in entries.as_array().into_iter().flatten() {
        let Some(date) = entry
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            tracing::warn!("Dropping archive entry without a valid date: {}", entry);
            continue;
        };
        let article_count = entry
            .get("article_count")
            .or_else(|| entry.get("post_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        index.record(ArchiveEntry { date, article_count });
    }
    index
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).await
}

/// Writes to a sibling temporary file, then renames it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Storage(format!("Not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub fn render_markdown(daily: &DailyArticles) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# 技术文章精选 {}\n", daily.date);

    if let Some(notice) = &daily.notice {
        let _ = writeln!(md, "{}", notice);
        return md;
    }

    let _ = writeln!(md, "共 {} 篇文章 · 模型 {}\n", daily.article_count, daily.ai_model);
    for article in &daily.articles {
        let _ = writeln!(md, "## [{}]({})\n", article.title, article.url);

        let mut meta = vec![article.feed_title.clone()];
        if !article.author.is_empty() {
            meta.push(article.author.clone());
        }
        if let Some(ts) = &article.published_at {
            meta.push(format_timestamp(ts));
        }
        let _ = writeln!(md, "*{}*\n", meta.join(" · "));

        let _ = writeln!(md, "{}\n", article.summary_zh);
        if !article.tags.is_empty() {
            let tags: Vec<String> = article.tags.iter().map(|t| format!("`{}`", t)).collect();
            let _ = writeln!(md, "标签：{}\n", tags.join(" "));
        }
    }
    md
}
