pub mod longform;
pub mod models;
pub mod summarize;
pub mod tags;

pub mod prelude {
    pub use super::longform::LongformWriter;
    pub use super::models::{create_model, try_create_model};
    pub use super::summarize::{BatchSummarizer, Summarized};
    pub use super::tags::Vocabulary;
    pub use xq_core::{Article, Error, Post, Result};
}

pub use longform::LongformWriter;
pub use models::{create_model, try_create_model};
pub use summarize::{BatchSummarizer, Summarized};
pub use tags::Vocabulary;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xq_core::config::AiConfig;
    use xq_core::{Post, TagPolicy};

    use crate::models::DummyModel;
    use crate::{BatchSummarizer, LongformWriter, Vocabulary};

    #[tokio::test]
    async fn test_summarize_then_longform() {
        let model = Arc::new(
            DummyModel::new()
                .reply(r#"[{"index": 1, "summary_zh": "摘要", "tags": ["AI/Agent"]}]"#, 30)
                .reply("长摘要", 90),
        );
        let config = AiConfig {
            retry_delay: std::time::Duration::ZERO,
            ..AiConfig::default()
        };
        let post = Post {
            title: "Agents".to_string(),
            url: "https://example.com/agents".to_string(),
            author: "A".to_string(),
            published_at: None,
            content: "agent loops".to_string(),
            word_count: 2,
            feed_title: "Blog".to_string(),
            feed_url: "https://example.com/feed".to_string(),
            category: "user-custom".to_string(),
        };

        let summarizer =
            BatchSummarizer::new(model.clone(), Vocabulary::new(TagPolicy::Hierarchical), config.clone());
        let mut result = summarizer.summarize_all(&[post], None, &[]).await;
        let long_tokens = LongformWriter::new(model, &config).enrich(&mut result.articles).await;

        assert_eq!(result.tokens_used + long_tokens, 120);
        assert_eq!(result.articles[0].tags, vec!["AI/Agent"]);
        assert_eq!(result.articles[0].summary_long.as_deref(), Some("长摘要"));
    }
}
