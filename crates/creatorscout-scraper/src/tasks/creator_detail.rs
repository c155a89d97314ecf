//! Creator profile plus the videos of their timeline.
//!
//! One page load serves both: the profile document carries the rehydration
//! payload, and the timeline arrives as `/api/post/item_list` responses that
//! keep coming while the page is scrolled. Both are read from the same
//! ordered response stream.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use creatorscout_core::{Video, VideoCap};

use crate::error::ScraperError;
use crate::extract::{is_interstitial, user_detail};
use crate::pool::PageTask;
use crate::records::video_from_item;
use crate::session::{HeadlessSession, NetworkResponse};
use crate::types::{ItemListPage, UserInfo};

use super::{decode_json, navigate_and_await, page_url};

const POST_LIST_PATH: &str = "/api/post/item_list";

/// Which creator to sync, and the industry of the hashtag that surfaced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorRequest {
    pub unique_id: String,
    pub industry: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatorDetail {
    pub profile: UserInfo,
    pub videos: Vec<Video>,
    pub industry: Option<String>,
}

pub struct CreatorDetailTask {
    web_base_url: String,
    cap: VideoCap,
    scroll_delay: Duration,
    wait_timeout: Duration,
    max_scrolls: u32,
}

impl CreatorDetailTask {
    #[must_use]
    pub fn new(web_base_url: &str, cap: VideoCap, scroll_delay: Duration, wait_timeout: Duration) -> Self {
        Self {
            web_base_url: web_base_url.to_owned(),
            cap,
            scroll_delay,
            wait_timeout,
            max_scrolls: 200,
        }
    }

    #[must_use]
    pub fn with_max_scrolls(mut self, max_scrolls: u32) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }
}

/// Accumulated state of one creator page.
struct Timeline {
    cap: VideoCap,
    profile: Option<UserInfo>,
    videos: Vec<Video>,
    video_ids: HashSet<String>,
    cursors: HashSet<String>,
    /// No further timeline pages are wanted.
    complete: bool,
}

impl Timeline {
    fn new(cap: VideoCap) -> Self {
        Self {
            cap,
            profile: None,
            videos: Vec::new(),
            video_ids: HashSet::new(),
            cursors: HashSet::new(),
            complete: false,
        }
    }

    fn is_done(&self) -> bool {
        self.profile.is_some() && self.complete
    }

    fn accept_profile(&mut self, response: &NetworkResponse) -> Result<(), ScraperError> {
        if is_interstitial(&response.body) {
            return Err(ScraperError::Interstitial {
                url: response.url.clone(),
            });
        }
        let info = user_detail(&response.body, &response.url)?;
        if info.stats.video_count == 0 {
            self.complete = true;
        }
        self.profile = Some(info);
        Ok(())
    }

    /// Returns whether another page should be requested.
    fn accept_page(&mut self, page: &ItemListPage) -> bool {
        if !self.cursors.insert(page.cursor_key()) {
            return !self.complete;
        }
        for item in &page.item_list {
            if self.cap.is_reached(self.videos.len()) {
                break;
            }
            if self.video_ids.insert(item.id.clone()) {
                self.videos.push(video_from_item(item, None));
            }
        }
        if !page.has_more || self.cap.is_reached(self.videos.len()) {
            self.complete = true;
        }
        !self.complete
    }
}

#[async_trait]
impl<S: HeadlessSession + 'static> PageTask<S> for CreatorDetailTask {
    type Payload = CreatorRequest;
    type Output = CreatorDetail;

    fn label(&self, request: &CreatorRequest) -> String {
        format!("creator @{}", request.unique_id)
    }

    async fn run(&self, session: &S, request: CreatorRequest) -> Result<CreatorDetail, ScraperError> {
        let handle = format!("@{}", request.unique_id);
        let url = page_url(&self.web_base_url, &[handle.as_str()], &[])?;
        let profile_path = url.path().to_owned();
        let wanted = |url: &str, status: u16| {
            (url.contains(POST_LIST_PATH) && status == 200)
                || (url.contains(&profile_path) && !url.contains("/api/"))
        };

        let mut timeline = Timeline::new(self.cap);
        let mut scrolls = 0u32;
        let mut next = navigate_and_await(session, url.as_str(), &wanted, self.wait_timeout).await;

        loop {
            let response = match next {
                Ok(response) => response,
                Err(ScraperError::Timeout { .. }) if timeline.profile.is_some() => {
                    tracing::debug!(creator = %request.unique_id, "timeline went quiet, keeping what arrived");
                    break;
                }
                Err(e) => return Err(e),
            };

            if response.url.contains(POST_LIST_PATH) {
                let page: ItemListPage = decode_json(&response)?;
                let wants_more = timeline.accept_page(&page);
                if wants_more {
                    if scrolls >= self.max_scrolls {
                        tracing::warn!(
                            creator = %request.unique_id,
                            max_scrolls = self.max_scrolls,
                            "scroll limit reached"
                        );
                        timeline.complete = true;
                    } else {
                        tokio::time::sleep(self.scroll_delay).await;
                        session.scroll_to_bottom().await?;
                        scrolls += 1;
                    }
                }
            } else {
                timeline.accept_profile(&response)?;
            }

            if timeline.is_done() {
                break;
            }
            next = session.await_response_matching(&wanted, self.wait_timeout).await;
        }

        let Timeline { profile, videos, .. } = timeline;
        let profile = profile.ok_or_else(|| ScraperError::Extraction {
            context: url.to_string(),
            reason: "profile document never arrived".to_owned(),
        })?;
        tracing::debug!(
            creator = %request.unique_id,
            videos = videos.len(),
            scrolls,
            "creator timeline collected"
        );
        Ok(CreatorDetail {
            profile,
            videos,
            industry: request.industry,
        })
    }
}
