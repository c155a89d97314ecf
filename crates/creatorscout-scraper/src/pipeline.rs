//! End-to-end harvest: hashtags, then the videos behind them, then the
//! creators behind the videos.
//!
//! Each stage runs to completion before the next starts, writes its records
//! to the sink and reports progress to the notifier.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use creatorscout_core::merge::merge_video;
use creatorscout_core::{
    AppConfig, Hashtag, Notifier, PersistenceSink, PopularHashtagFilter, RunId, SinkError, Video,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::credentials::{BrowserBootstrapper, CredentialStore};
use crate::discovery::{DiscoveryOptions, HashtagDiscovery};
use crate::error::ScraperError;
use crate::pool::{PoolConfig, PoolReport, WorkerPool};
use crate::records::creator_from_detail;
use crate::session::BrowserDriver;
use crate::tasks::{
    AdmissionThresholds, CreatorDetail, CreatorDetailTask, CreatorRequest, HashtagVideos,
    HashtagVideosTask, VideoDetailClient,
};

/// What one run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    pub run_id: RunId,
    pub hashtags: usize,
    pub candidate_creators: usize,
    pub creators: usize,
    pub videos: usize,
    pub enriched_videos: usize,
    /// Items given up on across all stages.
    pub skipped_items: usize,
    /// Batch writes the sink rejected.
    pub sink_failures: usize,
    pub elapsed_secs: f64,
}

pub struct Harvester<D: BrowserDriver> {
    driver: Arc<D>,
    discovery: HashtagDiscovery,
    hashtag_task: Arc<HashtagVideosTask>,
    creator_task: Arc<CreatorDetailTask>,
    video_detail: Option<VideoDetailClient>,
    sink: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn Notifier>,
    pool_config: PoolConfig,
}

impl<D: BrowserDriver> Harvester<D> {
    /// Wire every component from configuration, bootstrapping credentials
    /// through `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if an HTTP client or URL cannot be built.
    pub fn from_config(
        config: &AppConfig,
        driver: Arc<D>,
        sink: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ScraperError> {
        let bootstrapper = BrowserBootstrapper::new(
            Arc::clone(&driver),
            &config.ads_base_url,
            Duration::from_millis(config.network_wait_timeout_ms),
            config.max_bootstrap_retries,
        );
        let credentials = Arc::new(CredentialStore::new(Arc::new(bootstrapper)));
        Self::with_credentials(config, driver, credentials, sink, notifier)
    }

    /// Like [`Harvester::from_config`] with an existing credential store.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if an HTTP client or URL cannot be built.
    pub fn with_credentials(
        config: &AppConfig,
        driver: Arc<D>,
        credentials: Arc<CredentialStore>,
        sink: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ScraperError> {
        let wait_timeout = Duration::from_millis(config.network_wait_timeout_ms);
        let discovery = HashtagDiscovery::with_base_url(
            &config.ads_base_url,
            credentials,
            DiscoveryOptions {
                max_retry: config.discovery_max_retry,
                retry_delay: Duration::from_millis(config.discovery_retry_delay_ms),
                page_delay: Duration::from_millis(config.discovery_page_delay_ms),
                max_data: config.discovery_max_data,
            },
            config.request_timeout_secs,
            &config.user_agent,
        )?;
        let hashtag_task = HashtagVideosTask::new(
            &config.web_base_url,
            AdmissionThresholds {
                min_engagement_rate: config.min_engagement_rate,
                min_views: config.min_views,
            },
            wait_timeout,
        );
        let creator_task = CreatorDetailTask::new(
            &config.web_base_url,
            config.creator_video_cap,
            Duration::from_millis(config.scroll_delay_ms),
            wait_timeout,
        );
        let video_detail = if config.enrich_videos {
            Some(VideoDetailClient::with_base_url(
                &config.web_base_url,
                config.request_timeout_secs,
                &config.user_agent,
                config.pool_retry_limit,
                config.pool_retry_delay_ms,
            )?)
        } else {
            None
        };

        Ok(Self {
            driver,
            discovery,
            hashtag_task: Arc::new(hashtag_task),
            creator_task: Arc::new(creator_task),
            video_detail,
            sink,
            notifier,
            pool_config: PoolConfig {
                max_concurrency: config.pool_max_concurrency,
                retry_limit: config.pool_retry_limit,
                retry_delay: Duration::from_millis(config.pool_retry_delay_ms),
                task_timeout: Duration::from_secs(config.pool_task_timeout_secs),
            },
        })
    }

    /// Harvest one country across `industries`.
    ///
    /// # Errors
    ///
    /// Only run-ending failures: credential exhaustion or a lost browser.
    /// Failed items are skipped and rejected sink writes are counted in the
    /// report.
    pub async fn run(&self, country: &str, industries: &[String]) -> Result<HarvestReport, ScraperError> {
        let run_id = RunId::new();
        let started = Instant::now();
        tracing::info!(run = %run_id, country, industries = industries.len(), "harvest started");
        self.notifier
            .notify(&format!(
                "Harvest {run_id} started for {country} across {} industries",
                industries.len()
            ))
            .await;

        match self.run_stages(run_id, country, industries, started).await {
            Ok(report) => {
                self.notifier
                    .notify(&format!(
                        "Harvest complete: {} hashtags, {} creators, {} videos in {:.1}s",
                        report.hashtags, report.creators, report.videos, report.elapsed_secs
                    ))
                    .await;
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run = %run_id, error = %e, "harvest aborted");
                self.notifier.notify(&format!("Harvest {run_id} aborted: {e}")).await;
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: RunId,
        country: &str,
        industries: &[String],
        started: Instant,
    ) -> Result<HarvestReport, ScraperError> {
        let mut report = HarvestReport {
            run_id,
            ..HarvestReport::default()
        };
        let mut pool = WorkerPool::new(Arc::clone(&self.driver), self.pool_config.clone());

        let hashtags = self.discover_hashtags(country, industries).await?;
        let stored = self.sink.upsert_hashtags(run_id, hashtags.clone()).await;
        report.hashtags = self.stored_count("hashtags", stored, &mut report).await;
        self.notify_stage(
            &format!("Get hashtags complete, got {} hashtags", report.hashtags),
            started,
        )
        .await;

        let (tagged, pool_report) = self.collect_hashtag_videos(&mut pool, hashtags).await?;
        report.skipped_items += pool_report.failed + pool_report.skipped;
        let (requests, admitted) = creator_queue(tagged);
        report.candidate_creators = requests.len();
        self.notify_stage(
            &format!(
                "Get videos complete, {} hashtags searched, {} creators queued",
                pool_report.succeeded,
                requests.len()
            ),
            started,
        )
        .await;

        let (details, pool_report) = self.collect_creators(&mut pool, requests).await?;
        report.skipped_items += pool_report.failed + pool_report.skipped;
        // Admitted videos of creators whose page failed would reference a
        // creator that is never stored.
        let detailed: HashSet<String> = details
            .iter()
            .map(|d| d.profile.user.unique_id.clone())
            .collect();
        let mut videos: HashMap<String, Video> = admitted
            .into_iter()
            .filter(|(_, video)| detailed.contains(&video.creator_unique_id))
            .collect();
        let mut creators = Vec::with_capacity(details.len());
        for detail in details {
            creators.push(creator_from_detail(
                &detail.profile,
                &detail.videos,
                detail.industry.as_deref(),
            ));
            for video in detail.videos {
                let merged = merge_video(videos.get(&video.id), video);
                videos.insert(merged.id.clone(), merged);
            }
        }
        let mut visited: Vec<String> = creators.iter().map(|c| c.unique_id.clone()).collect();
        let stored = self.sink.upsert_creators(run_id, creators).await;
        let creators_stored = stored.is_ok();
        report.creators = self.stored_count("creators", stored, &mut report).await;
        if creators_stored {
            let stored = self.sink.upsert_videos(videos.into_values().collect()).await;
            report.videos = self.stored_count("videos", stored, &mut report).await;
        } else {
            tracing::warn!(videos = videos.len(), "videos dropped with their creators");
            visited.clear();
        }
        self.notify_stage(
            &format!(
                "Get creators complete, got {} creators and {} videos",
                report.creators, report.videos
            ),
            started,
        )
        .await;

        if let Some(client) = &self.video_detail {
            for unique_id in &visited {
                let enrichment = client
                    .enrich_creator_videos(self.sink.as_ref(), unique_id, self.pool_config.max_concurrency)
                    .await;
                report.enriched_videos += enrichment.enriched;
                report.skipped_items += enrichment.failed;
            }
            self.notify_stage(
                &format!(
                    "Video details complete, enriched {} videos of {} creators",
                    report.enriched_videos,
                    visited.len()
                ),
                started,
            )
            .await;
        }

        report.elapsed_secs = started.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Discover every industry of `country`, a few filters at a time, and
    /// merge the results by hashtag name.
    async fn discover_hashtags(
        &self,
        country: &str,
        industries: &[String],
    ) -> Result<Vec<Hashtag>, ScraperError> {
        let results: Vec<Result<Vec<Hashtag>, ScraperError>> = stream::iter(industries)
            .map(|industry| {
                let filter = PopularHashtagFilter::new(country, industry.as_str());
                async move { self.discovery.discover(&filter).await }
            })
            .buffer_unordered(self.pool_config.max_concurrency.max(1))
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut hashtags = Vec::new();
        for result in results {
            for hashtag in result? {
                if seen.insert(hashtag.name.clone()) {
                    hashtags.push(hashtag);
                }
            }
        }
        Ok(hashtags)
    }

    async fn collect_hashtag_videos(
        &self,
        pool: &mut WorkerPool<D>,
        hashtags: Vec<Hashtag>,
    ) -> Result<(Vec<HashtagVideos>, PoolReport), ScraperError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for hashtag in hashtags {
            pool.enqueue(&self.hashtag_task, hashtag, tx.clone());
        }
        drop(tx);
        let pool_report = pool.await_idle().await?;

        let mut out = Vec::new();
        while let Some(found) = rx.recv().await {
            out.push(found);
        }
        Ok((out, pool_report))
    }

    async fn collect_creators(
        &self,
        pool: &mut WorkerPool<D>,
        requests: Vec<CreatorRequest>,
    ) -> Result<(Vec<CreatorDetail>, PoolReport), ScraperError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for request in requests {
            pool.enqueue(&self.creator_task, request, tx.clone());
        }
        drop(tx);
        let pool_report = pool.await_idle().await?;

        let mut out = Vec::new();
        while let Some(detail) = rx.recv().await {
            out.push(detail);
        }
        Ok((out, pool_report))
    }

    /// Refresh the country and industry reference sets in the sink.
    /// Returns how many countries and industries were stored.
    ///
    /// # Errors
    ///
    /// Returns the discovery error once retries are exhausted, or a sink error.
    pub async fn sync_reference_data(&self) -> Result<(usize, usize), ScraperError> {
        let filters = self.discovery.fetch_filters().await?;
        let counts = (filters.countries.len(), filters.industries.len());
        self.sink
            .upsert_reference_data(filters.countries, filters.industries)
            .await?;
        self.notifier
            .notify(&format!(
                "Filters synced: {} countries, {} industries",
                counts.0, counts.1
            ))
            .await;
        Ok(counts)
    }

    /// Close the browser.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the browser does not close cleanly.
    pub async fn shutdown(&self) -> Result<(), ScraperError> {
        self.driver.shutdown().await
    }

    /// Count of a batch write, or zero after logging and reporting a
    /// rejected batch. The run carries on either way.
    async fn stored_count(
        &self,
        what: &str,
        stored: Result<usize, SinkError>,
        report: &mut HarvestReport,
    ) -> usize {
        match stored {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(run = %report.run_id, what, error = %e, "sink rejected batch");
                self.notifier
                    .notify(&format!("Storing {what} failed: {e}"))
                    .await;
                report.sink_failures += 1;
                0
            }
        }
    }

    async fn notify_stage(&self, message: &str, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(elapsed_secs = elapsed, "{message}");
        self.notifier.notify(&format!("{message} in {elapsed:.1}s")).await;
    }
}

/// One creator request per distinct author, in the order they were found,
/// tagged with the industry of the first hashtag that surfaced them. The
/// admitted videos are returned keyed by id.
fn creator_queue(found: Vec<HashtagVideos>) -> (Vec<CreatorRequest>, HashMap<String, Video>) {
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    let mut videos = HashMap::new();
    for HashtagVideos { hashtag, admitted } in found {
        for video in admitted {
            if seen.insert(video.creator_unique_id.clone()) {
                requests.push(CreatorRequest {
                    unique_id: video.creator_unique_id.clone(),
                    industry: Some(hashtag.industry_id.clone()).filter(|i| !i.is_empty()),
                });
            }
            videos.entry(video.id.clone()).or_insert(video);
        }
    }
    (requests, videos)
}
