use std::path::Path;

use clap::{Args, Subcommand};
use xq_core::config::FetchConfig;
use xq_core::recency::sort_newest_first;
use xq_core::types::format_timestamp;
use xq_core::{FeedDescriptor, Result};

use crate::feed_list::load_opml;
use crate::fetcher::FeedFetcher;

#[derive(Args, Debug)]
pub struct FeedArgs {
    #[command(subcommand)]
    pub command: FeedCommands,
}

#[derive(Subcommand, Debug)]
pub enum FeedCommands {
    /// List the feeds in the feed list, grouped by category
    List,
    /// Fetch every feed without summarizing or writing anything
    Fetch {
        /// How many of the newest posts to print
        #[arg(long, default_value_t = 10)]
        show: usize,
    },
}

pub async fn handle_command(args: FeedArgs, feeds_opml: &Path, fetch: &FetchConfig) -> Result<()> {
    let feeds = load_opml(feeds_opml)?;
    match args.command {
        FeedCommands::List => print_feed_list(&feeds),
        FeedCommands::Fetch { show } => {
            let fetcher = FeedFetcher::from_config(fetch)?;
            let mut report = fetcher.fetch_all(&feeds).await;

            println!(
                "Fetched {}/{} feeds, {} posts, {} failed",
                report.succeeded,
                feeds.len(),
                report.posts.len(),
                report.failed
            );
            for (url, reason) in &report.failures {
                println!("❌ {} - {}", url, reason);
            }

            sort_newest_first(&mut report.posts);
            for post in report.posts.iter().take(show) {
                let when = post.published_at.as_ref().map(format_timestamp).unwrap_or_default();
                println!("🆕 {} [{}] {} - {}", when, post.feed_title, post.title, post.url);
            }
        }
    }
    Ok(())
}

fn print_feed_list(feeds: &[FeedDescriptor]) {
    println!("{} feeds:", feeds.len());
    let mut current: Option<&str> = None;
    for feed in feeds {
        if current != Some(feed.category.as_str()) {
            let heading = if feed.category.is_empty() { "(uncategorized)" } else { &feed.category };
            println!("{}", heading);
            current = Some(feed.category.as_str());
        }
        println!("  {} - {}", feed.title, feed.xml_url);
    }
}
