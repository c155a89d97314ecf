//! Harvesting of trending hashtags, videos and creator profiles from the
//! creative center and the public web app.

pub mod chromium;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod notify;
pub mod pipeline;
pub mod pool;
pub mod records;
pub mod retry;
pub mod session;
pub mod stats;
pub mod tasks;
pub mod types;

pub use chromium::{ChromiumDriver, ChromiumOptions, ChromiumSession};
pub use credentials::{BrowserBootstrapper, CredentialSource, CredentialStore, ExhaustedHandler};
pub use discovery::{DiscoveryOptions, HashtagDiscovery, PlatformFilters};
pub use error::ScraperError;
pub use notify::TelegramNotifier;
pub use pipeline::{HarvestReport, Harvester};
pub use pool::{PageTask, PoolConfig, PoolReport, WorkerPool};
pub use retry::{is_fatal, is_retriable};
pub use session::{
    BrowserDriver, HeadlessSession, NetworkRequest, NetworkResponse, RequestFilter, ResponseFilter,
};
pub use tasks::{
    AdmissionThresholds, CreatorDetail, CreatorDetailTask, CreatorRequest, EnrichmentReport,
    HashtagVideos, HashtagVideosTask, VideoDetailClient, VideoProbe,
};
