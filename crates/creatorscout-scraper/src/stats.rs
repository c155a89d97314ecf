//! Video counter extraction.
//!
//! Each metric is read from the `statsV2` block first and falls back to the
//! legacy `stats` block when the newer value is absent or does not parse.
//! A metric missing from both stays `None`.

use creatorscout_core::VideoCounts;

use crate::types::{LooseInt, RawStats};

/// Parse the leading integer of `s`, ignoring anything after the digits.
///
/// `" 12abc"` → 12, `"-3"` → -3, `"abc"` → `None`, `"1.5K"` → 1.
#[must_use]
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .as_bytes()
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let magnitude = rest[..digits_end].parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn pick(v2: Option<&LooseInt>, legacy: Option<&LooseInt>) -> Option<i64> {
    v2.and_then(LooseInt::as_i64)
        .or_else(|| legacy.and_then(LooseInt::as_i64))
}

/// Merge the legacy and v2 counter blocks of one video.
#[must_use]
pub fn extract_stats(legacy: Option<&RawStats>, v2: Option<&RawStats>) -> VideoCounts {
    let empty = RawStats::default();
    let legacy = legacy.unwrap_or(&empty);
    let v2 = v2.unwrap_or(&empty);
    VideoCounts {
        like: pick(v2.digg_count.as_ref(), legacy.digg_count.as_ref()),
        share: pick(v2.share_count.as_ref(), legacy.share_count.as_ref()),
        comment: pick(v2.comment_count.as_ref(), legacy.comment_count.as_ref()),
        view: pick(v2.play_count.as_ref(), legacy.play_count.as_ref()),
        collect: pick(v2.collect_count.as_ref(), legacy.collect_count.as_ref()),
    }
}

/// `(like + share + comment) / view`, or `None` when a term is missing or
/// there are no views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_rate(counts: &VideoCounts) -> Option<f64> {
    let view = counts.view?;
    if view <= 0 {
        return None;
    }
    let interactions = counts
        .like?
        .saturating_add(counts.share?)
        .saturating_add(counts.comment?);
    Some(interactions as f64 / view as f64)
}

/// Engagement as a percentage, zero when any of the four counters is zero
/// or missing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_percent(counts: &VideoCounts) -> f64 {
    match (counts.like, counts.comment, counts.share, counts.view) {
        (Some(like), Some(comment), Some(share), Some(view))
            if like != 0 && comment != 0 && share != 0 && view != 0 =>
        {
            like.saturating_add(comment).saturating_add(share) as f64 / view as f64 * 100.0
        }
        _ => 0.0,
    }
}
