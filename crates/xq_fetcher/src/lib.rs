pub mod cli;
pub mod feed_list;
pub mod fetcher;
pub mod logging;
pub mod manager;
pub mod normalize;
pub mod transport;

pub use cli::{handle_command, FeedArgs, FeedCommands};
pub use feed_list::{load_opml, parse_opml};
pub use fetcher::{FeedFetcher, FetchOutcome, FetchReport};
pub use logging::{init_logging, Logger};
pub use manager::{PipelineManager, RunReport, TenantReport};
pub use transport::{FeedResponse, FeedTransport, HttpTransport};

pub mod prelude {
    pub use super::fetcher::{FeedFetcher, FetchOutcome};
    pub use super::manager::PipelineManager;
    pub use super::transport::FeedTransport;
    pub use xq_core::{Error, FeedDescriptor, Post, Result};
}
