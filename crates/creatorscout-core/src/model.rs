//! Domain records produced by a harvest run.
//!
//! Every persisted record has a stable identity: hashtags by `name`,
//! creators by `unique_id`, videos by `id`. Sinks upsert on those keys.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single harvest run.
///
/// Upserts carry the run id so a record resighted several times within one
/// run only bumps its `update_count` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Signed request headers harvested from a live browser session.
///
/// Opaque and valid until the platform rejects them with "no permission".
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub timestamp: String,
    pub signature: String,
    pub anonymous_session_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("timestamp", &self.timestamp)
            .field("signature", &"[redacted]")
            .field("anonymous_session_id", &self.anonymous_session_id)
            .finish()
    }
}

/// Page sizes accepted by the popular-hashtag listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    Ten,
    Twenty,
    #[default]
    Fifty,
}

impl PageSize {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Fifty => 50,
        }
    }
}

/// Trend windows accepted by the popular-hashtag listing, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendPeriod {
    #[default]
    Week,
    Month,
    Quarter,
}

impl TrendPeriod {
    #[must_use]
    pub fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 120,
        }
    }
}

/// Query for one industry/country slice of the popular-hashtag listing.
///
/// Only `page` changes while a discovery loop walks the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularHashtagFilter {
    pub page: u32,
    pub limit: PageSize,
    pub period: TrendPeriod,
    pub country_code: String,
    pub industry_id: String,
}

impl PopularHashtagFilter {
    /// First page, 50 per page, 7-day window.
    #[must_use]
    pub fn new(country_code: impl Into<String>, industry_id: impl Into<String>) -> Self {
        Self {
            page: 1,
            limit: PageSize::default(),
            period: TrendPeriod::default(),
            country_code: country_code.into(),
            industry_id: industry_id.into(),
        }
    }

    /// The listing only supports popularity ordering.
    #[must_use]
    pub fn sort_by(&self) -> &'static str {
        "popular"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub time: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hashtag {
    pub id: String,
    pub name: String,
    pub country_id: String,
    pub industry_id: String,
    pub is_promoted: bool,
    pub publish_count: i64,
    pub video_views: i64,
    pub trend: Vec<TrendPoint>,
    pub update_count: u32,
    pub last_run: Option<RunId>,
}

/// Contact details parsed out of a creator bio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub instagram: Option<String>,
}

/// Aggregate counters on a creator record.
///
/// `follower_count` and `video_count` come from the profile; the rest are
/// totals over the creator's synced videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorCounts {
    pub follower_count: i64,
    pub video_count: i64,
    pub like_count: i64,
    pub view_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub collect_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub unique_id: String,
    pub nickname: String,
    pub language_code: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: bool,
    pub is_verified: bool,
    pub is_seller: bool,
    pub visibility: bool,
    pub bio: Option<String>,
    pub bio_link: Option<String>,
    pub region: Option<String>,
    pub contact: Contact,
    pub counts: CreatorCounts,
    pub industries: BTreeSet<String>,
    pub update_count: u32,
    pub last_run: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagMention {
    pub hashtag_id: String,
    pub hashtag_name: String,
}

/// Engagement counters on a single video. Missing counts stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCounts {
    pub like: Option<i64>,
    pub comment: Option<i64>,
    pub share: Option<i64>,
    pub view: Option<i64>,
    pub collect: Option<i64>,
}

/// Fields only the video-detail pass can fill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEnrichment {
    pub suggested_words: Vec<String>,
    pub potential_categories: Vec<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub creator_id: String,
    pub creator_unique_id: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub hashtag_mentions: Vec<HashtagMention>,
    pub counts: VideoCounts,
    pub enrichment: Option<VideoEnrichment>,
    pub source_hashtag: Option<String>,
}

/// Country entry from the platform's filter reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub value: String,
    pub label: String,
}

/// Industry entry from the platform's filter reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Industry {
    pub id: String,
    pub value: String,
    pub label: String,
}
