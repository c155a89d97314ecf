use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// Signed headers could not be obtained, even after bootstrap retries.
    #[error("credential bootstrap failed: {reason}")]
    Credential { reason: String },

    /// The platform rejected the current credentials ("no permission").
    #[error("permission denied by platform while {context}")]
    Permission { context: String },

    /// The platform served an anti-bot "Please wait..." page.
    #[error("interstitial served for {url}")]
    Interstitial { url: String },

    #[error("extraction failed for {context}: {reason}")]
    Extraction { context: String, reason: String },

    #[error("timed out after {after_ms}ms waiting for {what}")]
    Timeout { what: String, after_ms: u64 },

    /// The page or its CDP target went away mid-task.
    #[error("page lost: {reason}")]
    PageLost { reason: String },

    /// The browser process is gone and cannot host new pages.
    #[error("browser unavailable: {reason}")]
    BrowserUnavailable { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("platform API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("sink error: {0}")]
    Sink(#[from] creatorscout_core::SinkError),
}
