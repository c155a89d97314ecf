//! In-process [`PersistenceSink`] used by the CLI and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::SinkError;
use crate::merge::{merge_counts, merge_creator, merge_hashtag, merge_video};
use crate::model::{
    Country, Creator, Hashtag, Industry, RunId, Video, VideoCounts, VideoEnrichment,
};
use crate::sink::PersistenceSink;

#[derive(Debug, Default, Clone, Serialize)]
pub struct StoreSnapshot {
    pub hashtags: Vec<Hashtag>,
    pub creators: Vec<Creator>,
    pub videos: Vec<Video>,
    pub countries: Vec<Country>,
    pub industries: Vec<Industry>,
}

#[derive(Debug, Default)]
struct Tables {
    hashtags: BTreeMap<String, Hashtag>,
    creators: BTreeMap<String, Creator>,
    videos: BTreeMap<String, Video>,
    countries: BTreeMap<String, Country>,
    industries: BTreeMap<String, Industry>,
}

/// Keyed maps behind a single async lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every table, ordered by key.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read().await;
        StoreSnapshot {
            hashtags: tables.hashtags.values().cloned().collect(),
            creators: tables.creators.values().cloned().collect(),
            videos: tables.videos.values().cloned().collect(),
            countries: tables.countries.values().cloned().collect(),
            industries: tables.industries.values().cloned().collect(),
        }
    }

    pub async fn hashtag(&self, name: &str) -> Option<Hashtag> {
        self.tables.read().await.hashtags.get(name).cloned()
    }

    pub async fn creator(&self, unique_id: &str) -> Option<Creator> {
        self.tables.read().await.creators.get(unique_id).cloned()
    }

    pub async fn video(&self, id: &str) -> Option<Video> {
        self.tables.read().await.videos.get(id).cloned()
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn upsert_hashtags(&self, run: RunId, hashtags: Vec<Hashtag>) -> Result<usize, SinkError> {
        let mut tables = self.tables.write().await;
        let written = hashtags.len();
        for incoming in hashtags {
            let merged = merge_hashtag(tables.hashtags.get(&incoming.name), incoming, run);
            tables.hashtags.insert(merged.name.clone(), merged);
        }
        Ok(written)
    }

    async fn upsert_creators(&self, run: RunId, creators: Vec<Creator>) -> Result<usize, SinkError> {
        let mut tables = self.tables.write().await;
        let written = creators.len();
        for incoming in creators {
            let merged = merge_creator(tables.creators.get(&incoming.unique_id), incoming, run);
            tables.creators.insert(merged.unique_id.clone(), merged);
        }
        Ok(written)
    }

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<usize, SinkError> {
        let mut tables = self.tables.write().await;
        let written = videos.len();
        for incoming in videos {
            let merged = merge_video(tables.videos.get(&incoming.id), incoming);
            tables.videos.insert(merged.id.clone(), merged);
        }
        Ok(written)
    }

    async fn apply_video_enrichment(
        &self,
        video_id: &str,
        enrichment: VideoEnrichment,
        counts: VideoCounts,
    ) -> Result<(), SinkError> {
        let mut tables = self.tables.write().await;
        let video = tables
            .videos
            .get_mut(video_id)
            .ok_or_else(|| SinkError::UnknownKey {
                entity: "video",
                key: video_id.to_owned(),
            })?;
        video.counts = merge_counts(video.counts, counts);
        video.enrichment = Some(enrichment);
        Ok(())
    }

    async fn mark_creator_visible(&self, unique_id: &str) -> Result<(), SinkError> {
        let mut tables = self.tables.write().await;
        let creator = tables
            .creators
            .get_mut(unique_id)
            .ok_or_else(|| SinkError::UnknownKey {
                entity: "creator",
                key: unique_id.to_owned(),
            })?;
        creator.visibility = true;
        Ok(())
    }

    async fn upsert_reference_data(
        &self,
        countries: Vec<Country>,
        industries: Vec<Industry>,
    ) -> Result<(), SinkError> {
        let mut tables = self.tables.write().await;
        for country in countries {
            tables.countries.insert(country.id.clone(), country);
        }
        for industry in industries {
            tables.industries.insert(industry.id.clone(), industry);
        }
        Ok(())
    }

    async fn videos_for_creator(&self, unique_id: &str) -> Result<Vec<Video>, SinkError> {
        let tables = self.tables.read().await;
        Ok(tables
            .videos
            .values()
            .filter(|v| v.creator_unique_id == unique_id)
            .cloned()
            .collect())
    }
}
