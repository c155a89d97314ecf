//! Conversion from platform payloads to the domain records handed to a sink.

use std::collections::BTreeSet;

use chrono::DateTime;
use creatorscout_core::{
    Creator, CreatorCounts, Hashtag, HashtagMention, TrendPoint, Video, VideoEnrichment,
};

use crate::extract::contacts_from_bio;
use crate::stats::extract_stats;
use crate::types::{Item, PopularHashtag, UserInfo};

#[must_use]
pub fn hashtag_from_popular(tag: &PopularHashtag) -> Hashtag {
    Hashtag {
        id: tag.hashtag_id.clone(),
        name: tag.hashtag_name.clone(),
        country_id: tag.country_info.id.clone(),
        industry_id: tag.industry_info.id.clone(),
        is_promoted: tag.is_promoted,
        publish_count: tag.publish_cnt,
        video_views: tag.video_views,
        trend: tag
            .trend
            .iter()
            .map(|t| TrendPoint {
                time: t.time,
                value: t.value,
            })
            .collect(),
        update_count: 0,
        last_run: None,
    }
}

/// Video record without enrichment. Mentions with no hashtag name (user
/// tags) are dropped.
#[must_use]
pub fn video_from_item(item: &Item, source_hashtag: Option<&str>) -> Video {
    let hashtag_mentions = item
        .text_extra
        .iter()
        .filter_map(|extra| {
            let name = extra.hashtag_name.as_deref().filter(|n| !n.is_empty())?;
            Some(HashtagMention {
                hashtag_id: extra.hashtag_id.clone().unwrap_or_default(),
                hashtag_name: name.to_owned(),
            })
        })
        .collect();

    Video {
        id: item.id.clone(),
        creator_id: item.author.id.clone(),
        creator_unique_id: item.author.unique_id.clone(),
        description: item.desc.clone(),
        created_at: item
            .create_time
            .as_ref()
            .and_then(crate::types::LooseInt::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        hashtag_mentions,
        counts: extract_stats(item.stats.as_ref(), item.stats_v2.as_ref()),
        enrichment: None,
        source_hashtag: source_hashtag.map(str::to_owned),
    }
}

/// Detail-page fields of a video.
#[must_use]
pub fn enrichment_from_item(item: &Item) -> VideoEnrichment {
    VideoEnrichment {
        suggested_words: item.suggested_words.clone(),
        potential_categories: item.diversification_labels.clone(),
        address: item
            .content_location
            .as_ref()
            .and_then(|c| c.address.as_ref())
            .and_then(|a| a.street_address.clone()),
    }
}

/// Creator record from a profile and the videos synced with it.
///
/// Follower and video counts come from the profile; like, view, comment,
/// share and collect are totals over `videos`.
#[must_use]
pub fn creator_from_detail(info: &UserInfo, videos: &[Video], industry: Option<&str>) -> Creator {
    let mut counts = CreatorCounts {
        follower_count: info.stats.follower_count,
        video_count: info.stats.video_count,
        ..CreatorCounts::default()
    };
    for video in videos {
        add_count(&mut counts.like_count, video.counts.like);
        add_count(&mut counts.view_count, video.counts.view);
        add_count(&mut counts.comment_count, video.counts.comment);
        add_count(&mut counts.share_count, video.counts.share);
        add_count(&mut counts.collect_count, video.counts.collect);
    }

    let user = &info.user;
    let bio = user.signature.clone().filter(|s| !s.is_empty());
    let contact = contacts_from_bio(bio.as_deref());

    Creator {
        id: user.id.clone(),
        unique_id: user.unique_id.clone(),
        nickname: user.nickname.clone(),
        language_code: user.language.clone(),
        avatar_url: user.avatar_thumb.clone(),
        is_private: user.private_account,
        is_verified: user.verified,
        is_seller: user.tt_seller,
        visibility: false,
        bio,
        bio_link: user
            .bio_link
            .as_ref()
            .and_then(|b| b.link.clone())
            .filter(|l| !l.is_empty()),
        region: user.region.clone(),
        contact,
        counts,
        industries: industry.map(str::to_owned).into_iter().collect::<BTreeSet<_>>(),
        update_count: 0,
        last_run: None,
    }
}

fn add_count(total: &mut i64, count: Option<i64>) {
    *total = total.saturating_add(count.unwrap_or(0));
}
