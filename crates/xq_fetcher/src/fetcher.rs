use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use xq_core::config::FetchConfig;
use xq_core::{FeedDescriptor, Post, Result};

use crate::normalize::parse_feed;
use crate::transport::{FeedTransport, HttpTransport};

/// Result of fetching one feed. HTTP errors and unparseable documents count
/// as an empty success; only transport failures are failures.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Vec<Post>),
    Failure(String),
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Feed input order, then document order within each feed.
    pub posts: Vec<Post>,
    pub succeeded: usize,
    pub failed: usize,
    /// `(xml_url, reason)` for each failed feed.
    pub failures: Vec<(String, String)>,
}

pub struct FeedFetcher {
    transport: Arc<dyn FeedTransport>,
    max_concurrent: usize,
}

impl FeedFetcher {
    pub fn new(transport: Arc<dyn FeedTransport>, max_concurrent: usize) -> Self {
        Self {
            transport,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.max_concurrent))
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Fetches every feed with at most `max_concurrent` requests in flight.
    /// Never fails as a whole.
    pub async fn fetch_all(&self, feeds: &[FeedDescriptor]) -> FetchReport {
        let mut report = FetchReport::default();
        if feeds.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let tasks = feeds.iter().map(|feed| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return FetchOutcome::Failure(e.to_string()),
                };
                self.fetch_one(feed).await
            }
        });
        let outcomes = join_all(tasks).await;

        for (feed, outcome) in feeds.iter().zip(outcomes) {
            match outcome {
                FetchOutcome::Success(posts) => {
                    report.succeeded += 1;
                    report.posts.extend(posts);
                }
                FetchOutcome::Failure(reason) => {
                    tracing::debug!("Feed fetch failure for {}: {}", feed.xml_url, reason);
                    report.failed += 1;
                    report.failures.push((feed.xml_url.clone(), reason));
                }
            }
        }

        tracing::info!(
            "📡 Fetched {}/{} feeds, got {} posts, {} failed",
            report.succeeded,
            feeds.len(),
            report.posts.len(),
            report.failed
        );
        report
    }

    pub async fn fetch_one(&self, feed: &FeedDescriptor) -> FetchOutcome {
        let response = match self.transport.get(&feed.xml_url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", feed.xml_url, e);
                return FetchOutcome::Failure(e.to_string());
            }
        };

        if response.status != 200 {
            tracing::debug!("HTTP {} for {}", response.status, feed.xml_url);
            return FetchOutcome::Success(Vec::new());
        }

        match parse_feed(&response.body, feed) {
            Ok(posts) => FetchOutcome::Success(posts),
            Err(e) => {
                tracing::debug!("Parse error for {}: {}", feed.xml_url, e);
                FetchOutcome::Success(Vec::new())
            }
        }
    }
}
