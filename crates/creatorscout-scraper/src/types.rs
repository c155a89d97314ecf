//! Wire shapes of the platform payloads.
//!
//! Only the fields the harvester reads are modelled. The platform is loose
//! about numeric types (ids and counts arrive as numbers or strings), so
//! those go through [`LooseInt`] or [`de_string_or_number`].

use serde::{Deserialize, Deserializer};

/// An integer the platform may send as a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseInt {
    /// Integer value, with strings read by [`crate::stats::parse_int_prefix`].
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => crate::stats::parse_int_prefix(s),
        }
    }
}

/// Accept `"123"` or `123` and keep it as a string.
///
/// # Errors
///
/// Fails when the value is neither a string nor a number.
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::UInt(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Creative center (ads host)
// ---------------------------------------------------------------------------

/// `{code, msg, data}` envelope used by every creative-center endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterOption {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendSample {
    pub time: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopularHashtag {
    #[serde(deserialize_with = "de_string_or_number")]
    pub hashtag_id: String,
    pub hashtag_name: String,
    pub country_info: FilterOption,
    pub industry_info: FilterOption,
    #[serde(default)]
    pub trend: Vec<TrendSample>,
    #[serde(default)]
    pub publish_cnt: i64,
    #[serde(default)]
    pub video_views: i64,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub is_promoted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    #[serde(default)]
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashtagListData {
    #[serde(default)]
    pub list: Vec<PopularHashtag>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FiltersData {
    #[serde(default)]
    pub country: Vec<FilterOption>,
    #[serde(default)]
    pub industry: Vec<FilterOption>,
}

// ---------------------------------------------------------------------------
// Web host
// ---------------------------------------------------------------------------

/// Counter block. The same shape serves as the legacy `stats` (numbers) and
/// the newer `statsV2` (numeric strings).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    pub digg_count: Option<LooseInt>,
    pub share_count: Option<LooseInt>,
    pub comment_count: Option<LooseInt>,
    pub play_count: Option<LooseInt>,
    pub collect_count: Option<LooseInt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BioLink {
    pub link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    pub unique_id: String,
    #[serde(default)]
    pub nickname: String,
    pub avatar_thumb: Option<String>,
    pub signature: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub private_account: bool,
    #[serde(default)]
    pub tt_seller: bool,
    pub bio_link: Option<BioLink>,
    pub region: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExtra {
    #[serde(default)]
    pub hashtag_id: Option<String>,
    #[serde(default)]
    pub hashtag_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAddress {
    pub street_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLocation {
    pub address: Option<ContentAddress>,
}

/// One video as returned by `item_list` endpoints and the video detail page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    pub author: Author,
    pub create_time: Option<LooseInt>,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub text_extra: Vec<TextExtra>,
    #[serde(default)]
    pub stats: Option<RawStats>,
    #[serde(default)]
    pub stats_v2: Option<RawStats>,
    #[serde(default)]
    pub suggested_words: Vec<String>,
    #[serde(default)]
    pub diversification_labels: Vec<String>,
    pub content_location: Option<ContentLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListPage {
    pub cursor: Option<LooseInt>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub item_list: Vec<Item>,
}

impl ItemListPage {
    /// Cursor rendered as a string key; absent cursors map to `""`.
    #[must_use]
    pub fn cursor_key(&self) -> String {
        match &self.cursor {
            Some(LooseInt::Int(n)) => n.to_string(),
            Some(LooseInt::Float(f)) => f.to_string(),
            Some(LooseInt::Text(s)) => s.clone(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub heart_count: i64,
    #[serde(default)]
    pub video_count: i64,
}

/// `webapp.user-detail.userInfo` in the rehydration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub user: Author,
    pub stats: UserStats,
}
