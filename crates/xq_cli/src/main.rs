use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use xq_core::config::{
    AiConfig, FetchConfig, SelectionConfig, TenantConfig, DEFAULT_BASE_URL, DEFAULT_MODEL,
    DEFAULT_USER_AGENT,
};
use xq_core::{
    article_id, FeedDescriptor, PipelineConfig, Result, StalePolicy, TagPolicy, TenantBackend,
};
use xq_fetcher::{handle_command, init_logging, load_opml, FeedArgs, PipelineManager};

/// A duration written as `1d`, `48h`, `1h30m` or plain seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| format!("Duration is too large: {}", s))?;
                current_number.clear();
                has_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| format!("Duration is too large: {}", s))?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily tech-article digest from RSS/Atom feeds", long_about = None)]
pub struct Cli {
    /// OPML feed list
    #[arg(long, default_value = "feeds.opml")]
    feeds: PathBuf,
    /// Root of the published static content
    #[arg(long, default_value = "site/content")]
    content_dir: PathBuf,
    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, env = "FETCHER_MAX_CONCURRENT", default_value_t = 20)]
    max_concurrent: usize,
    /// Per-feed request timeout
    #[arg(long, env = "FETCHER_TIMEOUT", default_value = "15s")]
    timeout: HumanDuration,

    #[arg(long, env = "SILICONFLOW_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, env = "SILICONFLOW_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// Posts per summarization request
    #[arg(long, env = "AI_BATCH_SIZE", default_value_t = 12)]
    batch_size: usize,

    #[arg(long, value_enum, default_value_t = TagPolicy::Hierarchical)]
    tags: TagPolicy,
    /// Recency window for candidate posts
    #[arg(long, default_value = "48h")]
    window: HumanDuration,
    #[arg(long, default_value_t = 200)]
    max_candidates: usize,
    /// What to do when nothing falls inside the window
    #[arg(long, value_enum, default_value_t = StalePolicy::FailOpen)]
    stale_policy: StalePolicy,

    /// Where per-user feeds live. Defaults to supabase when its URL and key are set.
    #[arg(long, value_enum)]
    tenant_backend: Option<TenantBackend>,
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,
    #[arg(long, default_value = "tenants.db")]
    sqlite_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, summarize and publish today's digest
    Run {
        /// Run in periodic mode with the specified interval (e.g. 1d, 12h, 1h30m)
        #[arg(long)]
        interval: Option<HumanDuration>,
        /// Also process per-user feeds after each run
        #[arg(long)]
        with_tenants: bool,
    },
    /// Process per-user feeds only
    Tenants,
    /// Inspect the feed list
    Feeds(FeedArgs),
    /// Print the article id derived from a URL
    Id { url: String },
}

impl Cli {
    fn tenant_backend(&self) -> TenantBackend {
        match self.tenant_backend {
            Some(backend) => backend,
            None if self.supabase_url.is_some() && self.supabase_key.is_some() => TenantBackend::Supabase,
            None => TenantBackend::None,
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            feeds_opml: self.feeds.clone(),
            content_dir: self.content_dir.clone(),
            fetch: FetchConfig {
                max_concurrent: self.max_concurrent,
                timeout: self.timeout.0,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            ai: AiConfig {
                api_key: self.api_key.clone(),
                base_url: self.base_url.clone(),
                model: self.model.clone(),
                batch_size: self.batch_size,
                ..AiConfig::default()
            },
            selection: SelectionConfig {
                window: self.window.0,
                max_candidates: self.max_candidates,
                stale_policy: self.stale_policy,
            },
            tags: self.tags,
            tenants: TenantConfig {
                backend: self.tenant_backend(),
                supabase_url: self.supabase_url.clone(),
                supabase_key: self.supabase_key.clone(),
                sqlite_path: self.sqlite_path.clone(),
                ..TenantConfig::default()
            },
        }
    }
}

async fn run_cycle(manager: &PipelineManager, with_tenants: bool) -> Result<()> {
    let feeds = load_opml(&manager.config().feeds_opml)?;
    info!(
        "📋 Loaded {} feeds from {}",
        feeds.len(),
        manager.config().feeds_opml.display()
    );

    let report = manager.run_primary(&feeds).await?;
    if report.empty {
        info!("📭 No new items for {}", report.date);
    } else {
        info!(
            "📰 {}: {} articles from {} candidates, {} failed feeds, {} failed batches",
            report.date, report.articles, report.candidates, report.failed_feeds, report.failed_batches
        );
    }

    if with_tenants {
        run_tenants(manager, &feeds).await?;
    }
    Ok(())
}

async fn run_tenants(manager: &PipelineManager, global_feeds: &[FeedDescriptor]) -> Result<()> {
    let report = manager.run_tenants(global_feeds).await?;
    info!(
        "👥 Users: {} processed, {} skipped, {} failed, {} articles written ({} tokens)",
        report.processed, report.skipped, report.failed, report.articles_written, report.tokens_used
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let config = cli.pipeline_config();

    match cli.command {
        Commands::Id { url } => println!("{}", article_id(&url)),
        Commands::Feeds(args) => handle_command(args, &config.feeds_opml, &config.fetch).await?,
        Commands::Tenants => {
            let feeds = load_opml(&config.feeds_opml)?;
            let manager = PipelineManager::from_config(config).await?;
            run_tenants(&manager, &feeds).await?;
        }
        Commands::Run { interval, with_tenants } => {
            let manager = PipelineManager::from_config(config).await?;
            match interval {
                Some(interval) => {
                    info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                    loop {
                        info!("Starting run cycle");
                        if let Err(e) = run_cycle(&manager, with_tenants).await {
                            error!("Run failed: {}", e);
                        }
                        info!("Waiting {}s before next run", interval.0.as_secs());
                        tokio::time::sleep(interval.0).await;
                    }
                }
                None => run_cycle(&manager, with_tenants).await?,
            }
        }
    }

    Ok(())
}
