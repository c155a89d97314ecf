mod app_config;
mod config;
mod error;
pub mod merge;
pub mod model;
mod sink;
mod store;

pub use app_config::{AppConfig, VideoCap};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use error::{ConfigError, SinkError};
pub use model::{
    Contact, Country, Creator, CreatorCounts, Credentials, Hashtag, HashtagMention, Industry,
    PageSize, PopularHashtagFilter, RunId, TrendPeriod, TrendPoint, Video, VideoCounts,
    VideoEnrichment,
};
pub use sink::{LogNotifier, Notifier, PersistenceSink};
pub use store::{MemoryStore, StoreSnapshot};
