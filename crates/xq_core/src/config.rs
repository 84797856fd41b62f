use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

pub const DEFAULT_USER_AGENT: &str = "XinQiDong/1.0 RSS Aggregator";
pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3.2";

/// Process-wide settings, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feeds_opml: PathBuf,
    pub content_dir: PathBuf,
    pub fetch: FetchConfig,
    pub ai: AiConfig,
    pub selection: SelectionConfig,
    pub tags: TagPolicy,
    pub tenants: TenantConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds_opml: PathBuf::from("feeds.opml"),
            content_dir: PathBuf::from("site/content"),
            fetch: FetchConfig::default(),
            ai: AiConfig::default(),
            selection: SelectionConfig::default(),
            tags: TagPolicy::default(),
            tenants: TenantConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub batch_size: usize,
    /// Per-article content budget in the batch prompt, in characters.
    pub snippet_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one chat-completion request.
    pub request_timeout: Duration,
    /// Pause before the single retry of a failed batch.
    pub retry_delay: Duration,
    /// How many known subtags the hierarchical prompt lists.
    pub subtag_limit: usize,
    pub long_summary_chars: usize,
    pub long_summary_max_tokens: u32,
}

impl AiConfig {
    /// The credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: 12,
            snippet_chars: 1500,
            temperature: 0.3,
            max_tokens: 4000,
            request_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(2),
            subtag_limit: 60,
            long_summary_chars: 4000,
            long_summary_max_tokens: 1500,
        }
    }
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("snippet_chars", &self.snippet_chars)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// What to do when no post falls inside the recency window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StalePolicy {
    /// Use every post, newest first.
    #[default]
    #[value(name = "open")]
    FailOpen,
    /// Use nothing; the run publishes the "no new items" record.
    #[value(name = "closed")]
    FailClosed,
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub window: Duration,
    pub max_candidates: usize,
    pub stale_policy: StalePolicy,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(48 * 3600),
            max_candidates: 200,
            stale_policy: StalePolicy::FailOpen,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TagPolicy {
    /// Closed set of plain tags.
    Flat,
    /// Slash paths whose first segment is from a closed set.
    #[default]
    Hierarchical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TenantBackend {
    #[default]
    None,
    Memory,
    Sqlite,
    Supabase,
}

#[derive(Clone)]
pub struct TenantConfig {
    pub backend: TenantBackend,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub sqlite_path: PathBuf,
    /// Newest posts kept per tenant.
    pub max_posts: usize,
    /// Character cap on stored article content.
    pub content_cap: usize,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            backend: TenantBackend::None,
            supabase_url: None,
            supabase_key: None,
            sqlite_path: PathBuf::from("tenants.db"),
            max_posts: 50,
            content_cap: 50_000,
        }
    }
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("backend", &self.backend)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.as_deref().map(|_| "<redacted>"))
            .field("sqlite_path", &self.sqlite_path)
            .field("max_posts", &self.max_posts)
            .field("content_cap", &self.content_cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credential_is_absent() {
        let mut ai = AiConfig::default();
        assert_eq!(ai.credential(), None);
        ai.api_key = Some("   ".to_string());
        assert_eq!(ai.credential(), None);
        ai.api_key = Some("sk-test".to_string());
        assert_eq!(ai.credential(), Some("sk-test"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let ai = AiConfig {
            api_key: Some("sk-secret".to_string()),
            ..AiConfig::default()
        };
        let rendered = format!("{:?}", ai);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
