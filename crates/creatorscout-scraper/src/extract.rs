//! Payload extraction from server-rendered platform pages.
//!
//! Profile and video pages embed their state as JSON inside a
//! `__UNIVERSAL_DATA_FOR_REHYDRATION__` script tag. Everything that depends
//! on that layout lives here so a markup change touches one file.

use std::sync::LazyLock;

use creatorscout_core::Contact;
use regex::Regex;
use serde_json::Value;

use crate::error::ScraperError;
use crate::types::{Item, UserInfo};

const INTERSTITIAL_MARKER: &str = "Please wait...";
const VIDEO_NOT_FOUND: i64 = 10204;

static REHYDRATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__"([^>]+)>([^<]+)</script>"#)
        .expect("valid rehydration regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9._-]+@[a-zA-Z0-9._-]+\.[a-zA-Z0-9_-]+)").expect("valid email regex")
});

/// Returns `true` when the document is the anti-bot holding page.
#[must_use]
pub fn is_interstitial(html: &str) -> bool {
    html.contains(INTERSTITIAL_MARKER)
}

/// Parse the rehydration JSON out of a page.
///
/// # Errors
///
/// - [`ScraperError::Interstitial`] if the page is the "Please wait..." holding page.
/// - [`ScraperError::Extraction`] if the anchor is missing.
/// - [`ScraperError::Deserialize`] if the embedded JSON is malformed.
pub fn rehydration_payload(html: &str, url: &str) -> Result<Value, ScraperError> {
    let Some(captures) = REHYDRATION_RE.captures(html) else {
        if is_interstitial(html) {
            return Err(ScraperError::Interstitial {
                url: url.to_owned(),
            });
        }
        return Err(ScraperError::Extraction {
            context: url.to_owned(),
            reason: "rehydration script not found".to_owned(),
        });
    };
    let raw = captures.get(2).map_or("", |m| m.as_str());
    serde_json::from_str(raw).map_err(|e| ScraperError::Deserialize {
        context: format!("rehydration payload of {url}"),
        source: e,
    })
}

fn default_scope<'a>(payload: &'a Value, key: &str, url: &str) -> Result<&'a Value, ScraperError> {
    payload
        .get("__DEFAULT_SCOPE__")
        .and_then(|scope| scope.get(key))
        .ok_or_else(|| ScraperError::Extraction {
            context: url.to_owned(),
            reason: format!("{key} missing from default scope"),
        })
}

/// Creator profile and aggregate stats from a profile page.
///
/// # Errors
///
/// Any error of [`rehydration_payload`], plus [`ScraperError::Extraction`]
/// when the user-detail section is missing or malformed.
pub fn user_detail(html: &str, url: &str) -> Result<UserInfo, ScraperError> {
    let payload = rehydration_payload(html, url)?;
    let info = default_scope(&payload, "webapp.user-detail", url)?
        .get("userInfo")
        .cloned()
        .ok_or_else(|| ScraperError::Extraction {
            context: url.to_owned(),
            reason: "userInfo missing".to_owned(),
        })?;
    serde_json::from_value(info).map_err(|e| ScraperError::Deserialize {
        context: format!("userInfo of {url}"),
        source: e,
    })
}

/// Video record from a video detail page.
///
/// # Errors
///
/// - [`ScraperError::NotFound`] when the page reports status 10204.
/// - [`ScraperError::Extraction`] for any other non-zero status or a
///   missing `itemStruct`.
/// - Any error of [`rehydration_payload`].
pub fn video_detail(html: &str, url: &str) -> Result<Item, ScraperError> {
    let payload = rehydration_payload(html, url)?;
    let detail = default_scope(&payload, "webapp.video-detail", url)?;

    let status = detail.get("statusCode").and_then(Value::as_i64).unwrap_or(0);
    if status == VIDEO_NOT_FOUND {
        return Err(ScraperError::NotFound {
            what: url.to_owned(),
        });
    }
    if status != 0 {
        let msg = detail
            .get("statusMsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(ScraperError::Extraction {
            context: url.to_owned(),
            reason: format!("status {status}: {msg}"),
        });
    }

    let item = detail
        .get("itemInfo")
        .and_then(|info| info.get("itemStruct"))
        .cloned()
        .ok_or_else(|| ScraperError::Extraction {
            context: url.to_owned(),
            reason: "itemStruct missing".to_owned(),
        })?;
    serde_json::from_value(item).map_err(|e| ScraperError::Deserialize {
        context: format!("itemStruct of {url}"),
        source: e,
    })
}

/// Contact details found in a bio. Every e-mail-looking token is kept,
/// joined with `", "`. Phone and Instagram handles are not parsed.
#[must_use]
pub fn contacts_from_bio(bio: Option<&str>) -> Contact {
    let emails: Vec<&str> = bio
        .map(|text| EMAIL_RE.find_iter(text).map(|m| m.as_str()).collect())
        .unwrap_or_default();
    Contact {
        email: (!emails.is_empty()).then(|| emails.join(", ")),
        phone: None,
        instagram: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn page_with(payload: &Value) -> String {
        format!(
            r#"<html><head><script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">{payload}</script></head></html>"#
        )
    }

    fn user_payload() -> Value {
        json!({
            "__DEFAULT_SCOPE__": {
                "webapp.user-detail": {
                    "userInfo": {
                        "user": {
                            "id": "6800000000000000000",
                            "uniqueId": "alice",
                            "nickname": "Alice",
                            "avatarThumb": "https://cdn.example/a.jpg",
                            "signature": "biz: alice@shop.id",
                            "verified": true,
                            "privateAccount": false,
                            "bioLink": {"link": "linktr.ee/alice"},
                            "region": "ID",
                            "language": "id",
                            "ttSeller": false
                        },
                        "stats": {
                            "followerCount": 1200,
                            "followingCount": 3,
                            "heartCount": 99000,
                            "videoCount": 41
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn user_detail_reads_profile_and_stats() {
        let html = page_with(&user_payload());
        let info = user_detail(&html, "https://www.tiktok.com/@alice").unwrap();
        assert_eq!(info.user.unique_id, "alice");
        assert_eq!(info.user.region.as_deref(), Some("ID"));
        assert_eq!(
            info.user.bio_link.and_then(|b| b.link).as_deref(),
            Some("linktr.ee/alice")
        );
        assert_eq!(info.stats.follower_count, 1200);
        assert_eq!(info.stats.video_count, 41);
    }

    #[test]
    fn missing_anchor_on_holding_page_is_interstitial() {
        let html = "<html><body>Please wait...</body></html>";
        let err = rehydration_payload(html, "https://www.tiktok.com/@alice").unwrap_err();
        assert!(matches!(err, ScraperError::Interstitial { .. }));
    }

    #[test]
    fn missing_anchor_elsewhere_is_extraction_error() {
        let err = rehydration_payload("<html></html>", "u").unwrap_err();
        assert!(matches!(err, ScraperError::Extraction { .. }));
    }

    #[test]
    fn malformed_json_is_deserialize_error() {
        let html =
            r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">{nope</script>"#;
        let err = rehydration_payload(html, "u").unwrap_err();
        assert!(matches!(err, ScraperError::Deserialize { .. }));
    }

    #[test]
    fn video_detail_maps_status_10204_to_not_found() {
        let html = page_with(&json!({
            "__DEFAULT_SCOPE__": {"webapp.video-detail": {"statusCode": 10204, "statusMsg": "item doesn't exist"}}
        }));
        let err = video_detail(&html, "u").unwrap_err();
        assert!(matches!(err, ScraperError::NotFound { .. }));
    }

    #[test]
    fn video_detail_other_status_is_extraction_error() {
        let html = page_with(&json!({
            "__DEFAULT_SCOPE__": {"webapp.video-detail": {"statusCode": 10000}}
        }));
        let err = video_detail(&html, "u").unwrap_err();
        assert!(matches!(err, ScraperError::Extraction { .. }));
    }

    #[test]
    fn video_detail_reads_enrichment_fields() {
        let html = page_with(&json!({
            "__DEFAULT_SCOPE__": {"webapp.video-detail": {
                "statusCode": 0,
                "itemInfo": {"itemStruct": {
                    "id": "7300000000000000001",
                    "author": {"id": "1", "uniqueId": "alice"},
                    "createTime": "1700000000",
                    "desc": "street food #kuliner",
                    "suggestedWords": ["street food jakarta"],
                    "diversificationLabels": ["Food & Drink"],
                    "contentLocation": {"address": {"streetAddress": "Jl. Sudirman"}},
                    "statsV2": {"playCount": "1000", "diggCount": "90"}
                }}
            }}
        }));
        let item = video_detail(&html, "u").unwrap();
        assert_eq!(item.suggested_words, vec!["street food jakarta".to_owned()]);
        assert_eq!(item.diversification_labels, vec!["Food & Drink".to_owned()]);
        assert_eq!(
            item.content_location
                .and_then(|c| c.address)
                .and_then(|a| a.street_address)
                .as_deref(),
            Some("Jl. Sudirman")
        );
    }

    #[test]
    fn contacts_join_every_email() {
        let contact = contacts_from_bio(Some("dm me / a.b@x.co or c_d@y.id"));
        assert_eq!(contact.email.as_deref(), Some("a.b@x.co, c_d@y.id"));
        assert!(contact.phone.is_none());
        assert!(contact.instagram.is_none());
    }

    #[test]
    fn contacts_are_empty_without_email() {
        assert_eq!(contacts_from_bio(Some("just vibes")), Contact::default());
        assert_eq!(contacts_from_bio(None), Contact::default());
    }
}
