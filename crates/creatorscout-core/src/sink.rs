//! Outbound seams of the harvester: where records go and who hears about
//! progress.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::model::{
    Country, Creator, Hashtag, Industry, RunId, Video, VideoCounts, VideoEnrichment,
};

/// Upsert-by-key storage for harvested records.
///
/// Implementations must be idempotent under repeated delivery and apply the
/// rules in [`crate::merge`].
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Upsert hashtags keyed by name. Returns how many records were written.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the backing store rejects a record.
    async fn upsert_hashtags(&self, run: RunId, hashtags: Vec<Hashtag>) -> Result<usize, SinkError>;

    /// Upsert creators keyed by `unique_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the backing store rejects a record.
    async fn upsert_creators(&self, run: RunId, creators: Vec<Creator>) -> Result<usize, SinkError>;

    /// Upsert videos keyed by id.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the backing store rejects a record.
    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<usize, SinkError>;

    /// Attach detail-page fields to an already stored video.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnknownKey`] if the video was never upserted.
    async fn apply_video_enrichment(
        &self,
        video_id: &str,
        enrichment: VideoEnrichment,
        counts: VideoCounts,
    ) -> Result<(), SinkError>;

    /// Flag a creator as fully enriched.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnknownKey`] if the creator was never upserted.
    async fn mark_creator_visible(&self, unique_id: &str) -> Result<(), SinkError>;

    /// Replace the country and industry reference sets.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the backing store rejects a record.
    async fn upsert_reference_data(
        &self,
        countries: Vec<Country>,
        industries: Vec<Industry>,
    ) -> Result<(), SinkError>;

    /// Videos stored for a creator, used to drive the enrichment pass.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the backing store cannot be read.
    async fn videos_for_creator(&self, unique_id: &str) -> Result<Vec<Video>, SinkError>;
}

/// Fire-and-forget status messages. Delivery failures never reach the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Notifier that only writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::info!(target: "creatorscout::notify", "{message}");
    }
}
