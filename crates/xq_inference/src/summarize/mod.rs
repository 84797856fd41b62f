//! Batched summarization: one prompt per fixed-size batch, a single retry,
//! and a deterministic per-post fallback.

use std::sync::Arc;

use xq_core::config::AiConfig;
use xq_core::{Article, CompletionRequest, Post, Result, TextGenerator};

use crate::tags::{recent_subtags, Vocabulary};

pub mod parse;
pub mod prompt;

pub use parse::{parse_batch_response, strip_code_fence, BatchSummary, BatchSummaryResult};
pub use prompt::render_batch_prompt;

/// Result of one batch call. Failed batches carry an empty mapping and zero tokens.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub summaries: BatchSummaryResult,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Summarized {
    pub articles: Vec<Article>,
    pub tokens_used: u64,
    pub failed_batches: usize,
}

pub struct BatchSummarizer {
    model: Arc<dyn TextGenerator>,
    vocabulary: Vocabulary,
    config: AiConfig,
}

impl BatchSummarizer {
    pub fn new(model: Arc<dyn TextGenerator>, vocabulary: Vocabulary, config: AiConfig) -> Self {
        Self {
            model,
            vocabulary,
            config,
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Enrich `posts` in order, batch by batch. `prior` are previously published
    /// articles (newest first) used to seed the known-subtag list.
    pub async fn summarize_all(
        &self,
        posts: &[Post],
        custom_prompt: Option<&str>,
        prior: &[Article],
    ) -> Summarized {
        let mut summarized = Summarized::default();
        let limit = self.config.subtag_limit;
        let batch_size = self.config.batch_size.max(1);
        let total = posts.len().div_ceil(batch_size);

        for (n, batch) in posts.chunks(batch_size).enumerate() {
            let known = recent_subtags(summarized.articles.iter().rev().chain(prior.iter()), limit);
            tracing::info!("🤖 Summarizing batch {}/{} ({} posts)", n + 1, total, batch.len());

            let outcome = self.summarize_batch(batch, custom_prompt, &known).await;
            if outcome.summaries.is_empty() {
                summarized.failed_batches += 1;
            }
            summarized.tokens_used += outcome.tokens_used;
            summarized.articles.extend(self.resolve(batch, &outcome.summaries));
        }

        summarized
    }

    /// Runs one batch with a single retry. Never fails; see [`BatchOutcome`].
    pub async fn summarize_batch(
        &self,
        batch: &[Post],
        custom_prompt: Option<&str>,
        known_subtags: &[String],
    ) -> BatchOutcome {
        if batch.is_empty() {
            return BatchOutcome::default();
        }

        let request = CompletionRequest {
            prompt: render_batch_prompt(
                batch,
                &self.vocabulary,
                known_subtags,
                self.config.snippet_chars,
                custom_prompt,
            ),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        match self.attempt(&request).await {
            Ok(outcome) => return outcome,
            Err(e) => tracing::warn!("⚠️ Batch summarization failed, retrying once: {}", e),
        }

        if !self.config.retry_delay.is_zero() {
            tokio::time::sleep(self.config.retry_delay).await;
        }

        match self.attempt(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "❌ Batch summarization failed after retry, using fallback for {} posts: {}",
                    batch.len(),
                    e
                );
                BatchOutcome::default()
            }
        }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<BatchOutcome> {
        let completion = self.model.complete(request).await?;
        let summaries = parse_batch_response(&completion.text)?;
        Ok(BatchOutcome {
            summaries,
            tokens_used: completion.total_tokens,
        })
    }

    /// Maps a batch's results back onto its posts by 1-based position.
    pub fn resolve(&self, batch: &[Post], summaries: &BatchSummaryResult) -> Vec<Article> {
        batch
            .iter()
            .enumerate()
            .map(|(i, post)| {
                let (summary_zh, tags) = match summaries.get(&(i + 1)) {
                    Some(entry) => {
                        let summary = if entry.summary_zh.trim().is_empty() {
                            post.title.clone()
                        } else {
                            entry.summary_zh.clone()
                        };
                        let mut tags = self.vocabulary.filter(&entry.tags);
                        if tags.is_empty() {
                            tags = self.vocabulary.classify_category(&post.category);
                        }
                        (summary, tags)
                    }
                    None => (post.title.clone(), self.vocabulary.classify_category(&post.category)),
                };
                Article::from_post(post, summary_zh, self.with_catch_all(tags))
            })
            .collect()
    }

    /// Title-only articles for when no model is available.
    pub fn fallback_articles(vocabulary: &Vocabulary, posts: &[Post]) -> Vec<Article> {
        posts
            .iter()
            .map(|post| {
                let mut tags = vocabulary.classify_category(&post.category);
                if tags.is_empty() {
                    tags.push(vocabulary.catch_all().to_string());
                }
                Article::from_post(post, post.title.clone(), tags)
            })
            .collect()
    }

    fn with_catch_all(&self, mut tags: Vec<String>) -> Vec<String> {
        if tags.is_empty() {
            tags.push(self.vocabulary.catch_all().to_string());
        }
        tags
    }
}
