//! Upsert merge rules shared by every [`crate::PersistenceSink`].
//!
//! Each function takes the stored record (if any) and the freshly scraped
//! one and returns what should be written. They are pure so sinks backed by
//! different storage engines resolve conflicts identically.

use crate::model::{Creator, Hashtag, RunId, Video, VideoCounts};

fn next_update_count(previous: u32, previous_run: Option<RunId>, run: RunId) -> u32 {
    if previous_run == Some(run) {
        previous
    } else {
        previous.saturating_add(1)
    }
}

/// Merge a resighted hashtag.
///
/// The stored platform id wins. Counts and trend are overwritten with the
/// latest sighting. `update_count` grows by one per run that sees the tag.
#[must_use]
pub fn merge_hashtag(existing: Option<&Hashtag>, incoming: Hashtag, run: RunId) -> Hashtag {
    let Some(existing) = existing else {
        return Hashtag {
            update_count: 0,
            last_run: Some(run),
            ..incoming
        };
    };

    Hashtag {
        id: existing.id.clone(),
        update_count: next_update_count(existing.update_count, existing.last_run, run),
        last_run: Some(run),
        ..incoming
    }
}

/// Merge a resynced creator.
///
/// Contact fields and the bio link only change when the new value is present.
/// Visibility never flips back to `false`, and industry tags accumulate.
#[must_use]
pub fn merge_creator(existing: Option<&Creator>, incoming: Creator, run: RunId) -> Creator {
    let Some(existing) = existing else {
        return Creator {
            update_count: 0,
            last_run: Some(run),
            ..incoming
        };
    };

    let mut merged = incoming;
    merged.bio_link = merged.bio_link.or_else(|| existing.bio_link.clone());
    merged.contact.email = merged.contact.email.or_else(|| existing.contact.email.clone());
    merged.contact.phone = merged.contact.phone.or_else(|| existing.contact.phone.clone());
    merged.contact.instagram = merged
        .contact
        .instagram
        .or_else(|| existing.contact.instagram.clone());
    merged.visibility |= existing.visibility;
    merged
        .industries
        .extend(existing.industries.iter().cloned());
    merged.update_count = next_update_count(existing.update_count, existing.last_run, run);
    merged.last_run = Some(run);
    merged
}

/// Merge a redelivered video. Enrichment and provenance survive an ordinary
/// upsert, and counts missing from the new sighting keep their stored value.
#[must_use]
pub fn merge_video(existing: Option<&Video>, incoming: Video) -> Video {
    let Some(existing) = existing else {
        return incoming;
    };

    let mut merged = incoming;
    merged.counts = merge_counts(existing.counts, merged.counts);
    merged.enrichment = merged.enrichment.or_else(|| existing.enrichment.clone());
    merged.source_hashtag = merged
        .source_hashtag
        .or_else(|| existing.source_hashtag.clone());
    if merged.created_at.is_none() {
        merged.created_at = existing.created_at;
    }
    merged
}

/// Newer counts win field by field; absent fields keep the stored value.
#[must_use]
pub fn merge_counts(stored: VideoCounts, fresh: VideoCounts) -> VideoCounts {
    VideoCounts {
        like: fresh.like.or(stored.like),
        comment: fresh.comment.or(stored.comment),
        share: fresh.share.or(stored.share),
        view: fresh.view.or(stored.view),
        collect: fresh.collect.or(stored.collect),
    }
}
