//! Scripted stand-in for a real browser.
//!
//! A [`FakeDriver`] holds routes keyed by a URL fragment. Navigating a
//! [`FakeSession`] to a matching URL queues the responses and requests the
//! route scripts for that visit; every `scroll_to_bottom` releases the next
//! batch of scroll responses.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use creatorscout_core::{
    Country, Creator, Hashtag, Industry, MemoryStore, PersistenceSink, RunId, SinkError, Video,
    VideoCounts, VideoEnrichment,
};
use creatorscout_scraper::{
    BrowserDriver, HeadlessSession, NetworkRequest, NetworkResponse, RequestFilter,
    ResponseFilter, ScraperError,
};
use serde_json::Value;
use tokio::sync::Notify;

/// What one navigation to a route produces.
#[derive(Debug, Clone, Default)]
pub struct Visit {
    pub responses: Vec<NetworkResponse>,
    pub requests: Vec<NetworkRequest>,
    /// One batch per scroll, in order.
    pub scroll_batches: Vec<Vec<NetworkResponse>>,
}

type Route = Arc<dyn Fn(usize) -> Visit + Send + Sync>;

#[derive(Default)]
struct DriverState {
    routes: Mutex<Vec<(String, Route)>>,
    visits: Mutex<HashMap<String, usize>>,
    fail_open: AtomicBool,
    opened: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    relaunches: AtomicUsize,
    shutdowns: AtomicUsize,
    scrolls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<DriverState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every visit to a URL containing `fragment` produces the same script.
    pub fn route(&self, fragment: &str, visit: Visit) -> &Self {
        self.route_with(fragment, move |_| visit.clone())
    }

    /// The script depends on the visit number, starting at 0.
    pub fn route_with(
        &self,
        fragment: &str,
        script: impl Fn(usize) -> Visit + Send + Sync + 'static,
    ) -> &Self {
        self.state
            .routes
            .lock()
            .unwrap()
            .push((fragment.to_owned(), Arc::new(script)));
        self
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    pub fn relaunches(&self) -> usize {
        self.state.relaunches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.state.scrolls.load(Ordering::SeqCst)
    }

    pub fn visits(&self, fragment: &str) -> usize {
        self.state
            .visits
            .lock()
            .unwrap()
            .get(fragment)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession, ScraperError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(ScraperError::BrowserUnavailable {
                reason: "scripted failure".to_owned(),
            });
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(VecDeque::new()),
            scroll_batches: Mutex::new(VecDeque::new()),
            response_arrived: Notify::new(),
            request_arrived: Notify::new(),
        })
    }

    async fn relaunch(&self) -> Result<(), ScraperError> {
        self.state.relaunches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ScraperError> {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSession {
    state: Arc<DriverState>,
    responses: Mutex<VecDeque<NetworkResponse>>,
    requests: Mutex<VecDeque<NetworkRequest>>,
    scroll_batches: Mutex<VecDeque<Vec<NetworkResponse>>>,
    response_arrived: Notify,
    request_arrived: Notify,
}

impl FakeSession {
    fn push_responses(&self, batch: Vec<NetworkResponse>) {
        self.responses.lock().unwrap().extend(batch);
        self.response_arrived.notify_one();
    }

    fn pop_response(&self) -> Option<NetworkResponse> {
        self.responses.lock().unwrap().pop_front()
    }

    fn pop_request(&self) -> Option<NetworkRequest> {
        self.requests.lock().unwrap().pop_front()
    }
}

fn timeout_error(what: &str, timeout: Duration) -> ScraperError {
    ScraperError::Timeout {
        what: what.to_owned(),
        after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

#[async_trait]
impl HeadlessSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), ScraperError> {
        let route = self
            .state
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(fragment, route)| (fragment.clone(), Arc::clone(route)));
        let Some((fragment, route)) = route else {
            return Ok(());
        };
        let visit_no = {
            let mut visits = self.state.visits.lock().unwrap();
            let n = visits.entry(fragment).or_insert(0);
            *n += 1;
            *n - 1
        };
        let visit = route(visit_no);
        self.scroll_batches
            .lock()
            .unwrap()
            .extend(visit.scroll_batches);
        self.requests.lock().unwrap().extend(visit.requests);
        self.request_arrived.notify_one();
        self.push_responses(visit.responses);
        Ok(())
    }

    async fn await_response_matching(
        &self,
        filter: ResponseFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkResponse, ScraperError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            while let Some(response) = self.pop_response() {
                if filter(&response.url, response.status) {
                    return Ok(response);
                }
            }
            if tokio::time::timeout_at(deadline, self.response_arrived.notified())
                .await
                .is_err()
            {
                return Err(timeout_error("scripted response", timeout));
            }
        }
    }

    async fn await_request_matching(
        &self,
        filter: RequestFilter<'_>,
        timeout: Duration,
    ) -> Result<NetworkRequest, ScraperError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            while let Some(request) = self.pop_request() {
                if filter(&request.url) {
                    return Ok(request);
                }
            }
            if tokio::time::timeout_at(deadline, self.request_arrived.notified())
                .await
                .is_err()
            {
                return Err(timeout_error("scripted request", timeout));
            }
        }
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        self.state.scrolls.fetch_add(1, Ordering::SeqCst);
        let batch = self.scroll_batches.lock().unwrap().pop_front();
        if let Some(batch) = batch {
            self.push_responses(batch);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.state.open_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// [`MemoryStore`] that rejects chosen writes the way a constrained
/// database would.
#[derive(Default)]
pub struct RejectingSink {
    pub inner: MemoryStore,
    reject_video: Option<String>,
    reject_creators: bool,
}

impl RejectingSink {
    pub fn rejecting_video(mut self, video_id: &str) -> Self {
        self.reject_video = Some(video_id.to_owned());
        self
    }

    pub fn rejecting_creators(mut self) -> Self {
        self.reject_creators = true;
        self
    }
}

fn rejected(entity: &'static str, key: &str) -> SinkError {
    SinkError::Rejected {
        entity,
        key: key.to_owned(),
        reason: "constraint violation".to_owned(),
    }
}

#[async_trait]
impl PersistenceSink for RejectingSink {
    async fn upsert_hashtags(&self, run: RunId, hashtags: Vec<Hashtag>) -> Result<usize, SinkError> {
        self.inner.upsert_hashtags(run, hashtags).await
    }

    async fn upsert_creators(&self, run: RunId, creators: Vec<Creator>) -> Result<usize, SinkError> {
        if self.reject_creators {
            let key = creators.first().map_or("", |c| c.unique_id.as_str());
            return Err(rejected("creator", key));
        }
        self.inner.upsert_creators(run, creators).await
    }

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<usize, SinkError> {
        self.inner.upsert_videos(videos).await
    }

    async fn apply_video_enrichment(
        &self,
        video_id: &str,
        enrichment: VideoEnrichment,
        counts: VideoCounts,
    ) -> Result<(), SinkError> {
        if self.reject_video.as_deref() == Some(video_id) {
            return Err(rejected("video", video_id));
        }
        self.inner.apply_video_enrichment(video_id, enrichment, counts).await
    }

    async fn mark_creator_visible(&self, unique_id: &str) -> Result<(), SinkError> {
        self.inner.mark_creator_visible(unique_id).await
    }

    async fn upsert_reference_data(
        &self,
        countries: Vec<Country>,
        industries: Vec<Industry>,
    ) -> Result<(), SinkError> {
        self.inner.upsert_reference_data(countries, industries).await
    }

    async fn videos_for_creator(&self, unique_id: &str) -> Result<Vec<Video>, SinkError> {
        self.inner.videos_for_creator(unique_id).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn response(url: &str, status: u16, body: impl Into<String>) -> NetworkResponse {
    NetworkResponse {
        url: url.to_owned(),
        status,
        body: body.into(),
    }
}

pub fn json_response(url: &str, body: &Value) -> NetworkResponse {
    response(url, 200, body.to_string())
}

pub fn request(url: &str, headers: &[(&str, &str)]) -> NetworkRequest {
    NetworkRequest {
        url: url.to_owned(),
        headers: headers
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

/// A page embedding `payload` the way the web app server-renders it.
pub fn rehydration_page(payload: &Value) -> String {
    format!(
        r#"<html><body><script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">{payload}</script></body></html>"#
    )
}

pub fn profile_page(unique_id: &str, video_count: i64) -> String {
    rehydration_page(&serde_json::json!({
        "__DEFAULT_SCOPE__": {
            "webapp.user-detail": {
                "userInfo": {
                    "user": {
                        "id": format!("uid-{unique_id}"),
                        "uniqueId": unique_id,
                        "nickname": unique_id,
                        "signature": format!("collabs: {unique_id}@studio.example"),
                        "region": "ID"
                    },
                    "stats": {"followerCount": 12000, "videoCount": video_count}
                }
            }
        }
    }))
}

/// Video item with v2 stats.
pub fn item(id: &str, author: &str, views: i64, likes: i64) -> Value {
    serde_json::json!({
        "id": id,
        "author": {"id": format!("uid-{author}"), "uniqueId": author},
        "desc": format!("video {id}"),
        "createTime": 1_700_000_000,
        "statsV2": {
            "playCount": views.to_string(),
            "diggCount": likes.to_string(),
            "shareCount": "0",
            "commentCount": "0",
            "collectCount": "0"
        }
    })
}

pub fn item_list(cursor: i64, has_more: bool, items: &[Value]) -> Value {
    serde_json::json!({"cursor": cursor, "hasMore": has_more, "itemList": items})
}
