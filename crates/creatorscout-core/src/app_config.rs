/// How many videos a creator-detail task keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCap {
    /// Keep the first `n` videos of the timeline.
    Recent(usize),
    /// Scroll through the full history.
    All,
}

impl VideoCap {
    #[must_use]
    pub fn is_reached(self, collected: usize) -> bool {
        match self {
            Self::Recent(n) => collected >= n,
            Self::All => false,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub ads_base_url: String,
    pub web_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub network_wait_timeout_ms: u64,
    pub max_bootstrap_retries: u32,
    pub discovery_max_retry: u32,
    pub discovery_retry_delay_ms: u64,
    pub discovery_page_delay_ms: u64,
    pub discovery_max_data: Option<usize>,
    pub pool_max_concurrency: usize,
    pub pool_retry_limit: u32,
    pub pool_retry_delay_ms: u64,
    pub pool_task_timeout_secs: u64,
    pub min_engagement_rate: f64,
    pub min_views: i64,
    pub creator_video_cap: VideoCap,
    pub scroll_delay_ms: u64,
    pub enrich_videos: bool,
    pub chrome_headless: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("ads_base_url", &self.ads_base_url)
            .field("web_base_url", &self.web_base_url)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("network_wait_timeout_ms", &self.network_wait_timeout_ms)
            .field("max_bootstrap_retries", &self.max_bootstrap_retries)
            .field("discovery_max_retry", &self.discovery_max_retry)
            .field("discovery_retry_delay_ms", &self.discovery_retry_delay_ms)
            .field("discovery_page_delay_ms", &self.discovery_page_delay_ms)
            .field("discovery_max_data", &self.discovery_max_data)
            .field("pool_max_concurrency", &self.pool_max_concurrency)
            .field("pool_retry_limit", &self.pool_retry_limit)
            .field("pool_retry_delay_ms", &self.pool_retry_delay_ms)
            .field("pool_task_timeout_secs", &self.pool_task_timeout_secs)
            .field("min_engagement_rate", &self.min_engagement_rate)
            .field("min_views", &self.min_views)
            .field("creator_video_cap", &self.creator_video_cap)
            .field("scroll_delay_ms", &self.scroll_delay_ms)
            .field("enrich_videos", &self.enrich_videos)
            .field("chrome_headless", &self.chrome_headless)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "[redacted]"),
            )
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}
