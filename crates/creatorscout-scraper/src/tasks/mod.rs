//! Per-item scraping work: the browser-driven tasks the worker pool runs and
//! the HTTP video-detail client used by the enrichment pass.

pub mod creator_detail;
pub mod hashtag_videos;
pub mod video_detail;

use std::time::Duration;

use reqwest::Url;

use crate::error::ScraperError;
use crate::session::{HeadlessSession, NetworkResponse, ResponseFilter};

pub use creator_detail::{CreatorDetail, CreatorDetailTask, CreatorRequest};
pub use hashtag_videos::{AdmissionThresholds, HashtagVideos, HashtagVideosTask};
pub use video_detail::{EnrichmentReport, VideoDetailClient, VideoProbe};

/// Build `{base}/{segments...}` with each segment percent-encoded.
pub(crate) fn page_url(
    base: &str,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Result<Url, ScraperError> {
    let invalid = |reason: String| ScraperError::Extraction {
        context: "page URL".to_owned(),
        reason,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(format!("invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| invalid(format!("'{base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Navigate to `url` while waiting for the first response `filter` accepts.
///
/// A navigation error only surfaces when no matching response arrived.
pub(crate) async fn navigate_and_await<S: HeadlessSession>(
    session: &S,
    url: &str,
    filter: ResponseFilter<'_>,
    timeout: Duration,
) -> Result<NetworkResponse, ScraperError> {
    let (navigation, response) = tokio::join!(
        session.navigate(url),
        session.await_response_matching(filter, timeout),
    );
    match (response, navigation) {
        (Ok(response), _) => Ok(response),
        (Err(ScraperError::Timeout { .. }), Err(nav)) => Err(nav),
        (Err(e), _) => Err(e),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    response: &NetworkResponse,
) -> Result<T, ScraperError> {
    serde_json::from_str(&response.body).map_err(|e| ScraperError::Deserialize {
        context: response.url.clone(),
        source: e,
    })
}
