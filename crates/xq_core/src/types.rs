use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::article_id;

/// One subscription from the feed list. `xml_url` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub title: String,
    pub xml_url: String,
    pub html_url: String,
    /// May encode a path such as "Tech / AI".
    pub category: String,
}

/// A normalized feed entry before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub author: String,
    #[serde(with = "iso_or_empty")]
    pub published_at: Option<DateTime<Utc>>,
    pub content: String,
    pub word_count: usize,
    pub feed_title: String,
    pub feed_url: String,
    pub category: String,
}

impl Post {
    pub fn id(&self) -> String {
        article_id(&self.url)
    }
}

/// A post enriched with summary and tags, keyed by its url-derived id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub feed_title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, with = "iso_or_empty")]
    pub published_at: Option<DateTime<Utc>>,
    /// Stored separately per id; never part of list artifacts.
    #[serde(default, skip_serializing)]
    pub content: String,
    pub summary_zh: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_long: Option<String>,
}

impl Article {
    pub fn from_post(post: &Post, summary_zh: String, tags: Vec<String>) -> Self {
        Self {
            id: post.id(),
            title: post.title.clone(),
            url: post.url.clone(),
            author: post.author.clone(),
            feed_title: post.feed_title.clone(),
            category: post.category.clone(),
            published_at: post.published_at,
            content: post.content.clone(),
            summary_zh,
            tags,
            summary_long: None,
        }
    }
}

pub const NO_NEW_ITEMS_NOTICE: &str = "今日暂无新文章。";

/// The per-run artifact handed to the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyArticles {
    pub date: NaiveDate,
    pub article_count: usize,
    pub tokens_used: u64,
    pub ai_model: String,
    pub articles: Vec<Article>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl DailyArticles {
    pub fn new(date: NaiveDate, ai_model: &str, articles: Vec<Article>, tokens_used: u64) -> Self {
        Self {
            date,
            article_count: articles.len(),
            tokens_used,
            ai_model: ai_model.to_string(),
            articles,
            notice: None,
        }
    }

    /// The explicit "no new items" record written when a run has nothing to publish.
    pub fn empty(date: NaiveDate, ai_model: &str) -> Self {
        Self {
            notice: Some(NO_NEW_ITEMS_NOTICE.to_string()),
            ..Self::new(date, ai_model, Vec::new(), 0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub date: NaiveDate,
    pub article_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndex {
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveIndex {
    /// Replaces any entry for the same date and keeps entries sorted newest first.
    pub fn record(&mut self, entry: ArchiveEntry) {
        self.entries.retain(|e| e.date != entry.date);
        self.entries.push(entry);
        self.entries.sort_by(|a, b| b.date.cmp(&a.date));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pro") {
            Tier::Pro
        } else {
            Tier::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub user_id: String,
    pub custom_prompt: Option<String>,
    pub tier: Tier,
}

impl Tenant {
    /// Short form used in log lines.
    pub fn short_id(&self) -> String {
        let short: String = self.user_id.chars().take(8).collect();
        format!("{}...", short)
    }
}

/// One row of the tenant feed table joined with the owner's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantFeed {
    pub user_id: String,
    pub feed_url: String,
    pub feed_title: Option<String>,
    pub custom_prompt: Option<String>,
    pub tier: Tier,
}

impl TenantFeed {
    pub fn tenant(&self) -> Tenant {
        Tenant {
            user_id: self.user_id.clone(),
            custom_prompt: self.custom_prompt.clone().filter(|p| !p.trim().is_empty()),
            tier: self.tier,
        }
    }

    pub fn descriptor(&self) -> FeedDescriptor {
        let title = self
            .feed_title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.feed_url.clone());
        FeedDescriptor {
            title,
            xml_url: self.feed_url.clone(),
            html_url: String::new(),
            category: "user-custom".to_string(),
        }
    }
}

/// Feed url key used to compare tenant feeds against the global list.
pub fn normalize_feed_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// RFC 3339, second precision, `+00:00` offset.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Serializes an absent timestamp as `""` and accepts `""` or `null` back as `None`.
pub mod iso_or_empty {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.serialize_str(&super::format_timestamp(ts)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
