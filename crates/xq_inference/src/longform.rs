use std::sync::Arc;

use xq_core::config::AiConfig;
use xq_core::{truncate_chars, Article, CompletionRequest, TextGenerator};

/// Writes the extended summary premium tenants receive.
pub struct LongformWriter {
    model: Arc<dyn TextGenerator>,
    content_chars: usize,
    temperature: f32,
    max_tokens: u32,
}

impl LongformWriter {
    pub fn new(model: Arc<dyn TextGenerator>, config: &AiConfig) -> Self {
        Self {
            model,
            content_chars: config.long_summary_chars,
            temperature: config.temperature,
            max_tokens: config.long_summary_max_tokens,
        }
    }

    /// Fills `summary_long` for every article with content, one call each.
    /// A failed call leaves the field unset. Returns the tokens spent.
    pub async fn enrich(&self, articles: &mut [Article]) -> u64 {
        let mut tokens = 0;
        for article in articles.iter_mut() {
            let content = truncate_chars(&article.content, self.content_chars);
            if content.trim().is_empty() {
                continue;
            }

            let request = CompletionRequest {
                prompt: render_longform_prompt(&article.title, &article.feed_title, content),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            match self.model.complete(&request).await {
                Ok(completion) if !completion.text.trim().is_empty() => {
                    tokens += completion.total_tokens;
                    article.summary_long = Some(completion.text.trim().to_string());
                }
                Ok(completion) => {
                    tokens += completion.total_tokens;
                    tracing::warn!("Long summary for {} came back empty", article.id);
                }
                Err(e) => tracing::warn!("Long summary failed for {}: {}", article.id, e),
            }
        }
        tokens
    }
}

fn render_longform_prompt(title: &str, feed_title: &str, content: &str) -> String {
    format!(
        "请为以下文章写一篇深度中文摘要（300-500字），包含：\n\
         1. 文章核心观点\n\
         2. 关键论据或数据\n\
         3. 对读者的实际价值\n\n\
         文章标题: {}\n\
         来源: {}\n\
         内容:\n{}\n\n\
         请直接输出摘要正文，不要加标题或前缀。",
        title, feed_title, content
    )
}
