//! Candidate videos from a hashtag's challenge page.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use creatorscout_core::{Hashtag, Video, VideoCounts};

use crate::error::ScraperError;
use crate::extract::is_interstitial;
use crate::pool::PageTask;
use crate::records::video_from_item;
use crate::session::HeadlessSession;
use crate::stats::engagement_rate;
use crate::types::{Item, ItemListPage};

use super::{decode_json, navigate_and_await, page_url};

const ITEM_LIST_PATH: &str = "/api/challenge/item_list";
const TAG_PATH: &str = "/tag/";

/// Minimum engagement for a video to put its author on the creator queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionThresholds {
    /// `(like + share + comment) / view`, inclusive.
    pub min_engagement_rate: f64,
    /// Views must be strictly above this.
    pub min_views: i64,
}

impl Default for AdmissionThresholds {
    fn default() -> Self {
        Self {
            min_engagement_rate: 0.05,
            min_views: 500_000,
        }
    }
}

impl AdmissionThresholds {
    #[must_use]
    pub fn admits(&self, counts: &VideoCounts) -> bool {
        let Some(rate) = engagement_rate(counts) else {
            return false;
        };
        rate >= self.min_engagement_rate && counts.view.is_some_and(|v| v > self.min_views)
    }
}

/// Videos admitted from one hashtag page.
#[derive(Debug, Clone)]
pub struct HashtagVideos {
    pub hashtag: Hashtag,
    pub admitted: Vec<Video>,
}

pub struct HashtagVideosTask {
    web_base_url: String,
    thresholds: AdmissionThresholds,
    wait_timeout: Duration,
}

impl HashtagVideosTask {
    #[must_use]
    pub fn new(web_base_url: &str, thresholds: AdmissionThresholds, wait_timeout: Duration) -> Self {
        Self {
            web_base_url: web_base_url.to_owned(),
            thresholds,
            wait_timeout,
        }
    }
}

/// Apply the admission filter to one item list.
///
/// Each author is judged on their first item only: a later, better item
/// from an author whose first item failed does not get them in.
#[must_use]
pub fn admit_items(items: &[Item], thresholds: &AdmissionThresholds, hashtag: &str) -> Vec<Video> {
    let mut seen_authors: HashSet<&str> = HashSet::new();
    items
        .iter()
        .filter(|item| seen_authors.insert(item.author.unique_id.as_str()))
        .map(|item| video_from_item(item, Some(hashtag)))
        .filter(|video| thresholds.admits(&video.counts))
        .collect()
}

#[async_trait]
impl<S: HeadlessSession + 'static> PageTask<S> for HashtagVideosTask {
    type Payload = Hashtag;
    type Output = HashtagVideos;

    fn label(&self, hashtag: &Hashtag) -> String {
        format!("hashtag #{}", hashtag.name)
    }

    async fn run(&self, session: &S, hashtag: Hashtag) -> Result<HashtagVideos, ScraperError> {
        let url = page_url(&self.web_base_url, &["tag", hashtag.name.as_str()], &[("lang", "en")])?;
        let wanted = |url: &str, status: u16| {
            (url.contains(ITEM_LIST_PATH) && status == 200) || url.contains(TAG_PATH)
        };

        let deadline = Instant::now() + self.wait_timeout;
        let mut response =
            navigate_and_await(session, url.as_str(), &wanted, self.wait_timeout).await?;
        loop {
            if response.url.contains(ITEM_LIST_PATH) {
                break;
            }
            if is_interstitial(&response.body) {
                return Err(ScraperError::Interstitial { url: response.url });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            response = session.await_response_matching(&wanted, remaining).await?;
        }

        let page: ItemListPage = decode_json(&response)?;
        let admitted = admit_items(&page.item_list, &self.thresholds, &hashtag.name);
        tracing::debug!(
            hashtag = %hashtag.name,
            items = page.item_list.len(),
            admitted = admitted.len(),
            "hashtag page filtered"
        );
        Ok(HashtagVideos { hashtag, admitted })
    }
}
