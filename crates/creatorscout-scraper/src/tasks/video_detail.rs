//! Video detail pages over plain HTTP: enrichment of stored videos and the
//! single-video stats probe.

use std::time::Duration;

use creatorscout_core::{PersistenceSink, VideoCounts};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Url};

use crate::error::ScraperError;
use crate::extract::video_detail;
use crate::records::enrichment_from_item;
use crate::retry::retry_with_backoff;
use crate::stats::{engagement_percent, extract_stats};
use crate::types::Item;

use super::page_url;

const DEFAULT_BASE_URL: &str = "https://www.tiktok.com";

/// Stats of one video and its engagement as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub counts: VideoCounts,
    pub engagement_rate_pct: f64,
}

/// Outcome of enriching one creator's videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub enriched: usize,
    /// Videos whose detail page could not be fetched or whose enrichment
    /// the sink rejected.
    pub failed: usize,
    /// Whether the sink accepted the visibility flag for the creator.
    pub marked_visible: bool,
}

/// HTTP client for `/@{creator}/video/{id}` pages.
///
/// Transient failures are retried with exponential backoff up to
/// `max_retries` additional attempts; a removed video is not retried.
pub struct VideoDetailClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl VideoDetailClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout_secs, user_agent, max_retries, backoff_base_ms)
    }

    /// Client with a custom origin (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
            max_retries,
            backoff_base_ms,
        })
    }

    /// Detail payload of one video.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::NotFound`] if the video was removed (not retried).
    /// - Extraction, status and transport errors once retries are exhausted.
    pub async fn fetch_detail(&self, unique_id: &str, video_id: &str) -> Result<Item, ScraperError> {
        let handle = format!("@{unique_id}");
        let url = page_url(&self.base_url, &[handle.as_str(), "video", video_id], &[])?;
        let what = format!("video {video_id}");
        retry_with_backoff(self.max_retries, self.backoff_base_ms, &what, || {
            let url = url.clone();
            async move { self.fetch_item(url).await }
        })
        .await
    }

    /// Stats of the video at `url`, with engagement as a percentage that is
    /// zero whenever one of the counts is zero or missing.
    ///
    /// # Errors
    ///
    /// Same as [`VideoDetailClient::fetch_detail`], plus
    /// [`ScraperError::Extraction`] for an unparsable URL.
    pub async fn probe_video(&self, url: &str) -> Result<VideoProbe, ScraperError> {
        let url = Url::parse(url).map_err(|e| ScraperError::Extraction {
            context: url.to_owned(),
            reason: e.to_string(),
        })?;
        let item = retry_with_backoff(self.max_retries, self.backoff_base_ms, "video probe", || {
            let url = url.clone();
            async move { self.fetch_item(url).await }
        })
        .await?;
        let counts = extract_stats(item.stats.as_ref(), item.stats_v2.as_ref());
        Ok(VideoProbe {
            counts,
            engagement_rate_pct: engagement_percent(&counts),
        })
    }

    /// Fetch detail pages for every stored video of a creator, write the
    /// results back and mark the creator visible once all were attempted.
    ///
    /// Fetch and sink failures are per item: they are logged and counted in
    /// the report, never returned.
    pub async fn enrich_creator_videos(
        &self,
        sink: &dyn PersistenceSink,
        unique_id: &str,
        concurrency: usize,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let videos = match sink.videos_for_creator(unique_id).await {
            Ok(videos) => videos,
            Err(e) => {
                tracing::warn!(creator = unique_id, error = %e, "stored videos unavailable, creator skipped");
                return report;
            }
        };
        let fetched: Vec<(String, Result<Item, ScraperError>)> = stream::iter(videos)
            .map(|video| async move {
                let result = self.fetch_detail(unique_id, &video.id).await;
                (video.id, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (video_id, result) in fetched {
            let item = match result {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(creator = unique_id, video = %video_id, error = %e, "video detail skipped");
                    report.failed += 1;
                    continue;
                }
            };
            let counts = extract_stats(item.stats.as_ref(), item.stats_v2.as_ref());
            match sink
                .apply_video_enrichment(&video_id, enrichment_from_item(&item), counts)
                .await
            {
                Ok(()) => report.enriched += 1,
                Err(e) => {
                    tracing::warn!(creator = unique_id, video = %video_id, error = %e, "enrichment rejected by sink");
                    report.failed += 1;
                }
            }
        }

        match sink.mark_creator_visible(unique_id).await {
            Ok(()) => report.marked_visible = true,
            Err(e) => tracing::warn!(creator = unique_id, error = %e, "creator visibility not stored"),
        }
        tracing::debug!(
            creator = unique_id,
            enriched = report.enriched,
            failed = report.failed,
            "creator videos enriched"
        );
        report
    }

    async fn fetch_item(&self, url: Url) -> Result<Item, ScraperError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                what: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let html = response.text().await?;
        video_detail(&html, url.as_str())
    }
}
