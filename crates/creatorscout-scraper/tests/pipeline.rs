//! End-to-end harvest with a scripted browser and a wiremock platform.

mod support;

use std::collections::HashMap;
use std::env::VarError;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use creatorscout_core::{build_app_config, AppConfig, MemoryStore, Notifier};
use creatorscout_scraper::Harvester;
use serde_json::{json, Value};
use support::{
    item, item_list, json_response, profile_page, rehydration_page, request, response, FakeDriver,
    RejectingSink, Visit,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATOR_PAGE: &str = "/business/creativecenter/inspiration/popular/creator/pc/en";
const INDUSTRY: &str = "14000000000";

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_owned());
    }
}

fn config(server: &MockServer, enrich: bool) -> AppConfig {
    let uri = server.uri();
    let vars: HashMap<&str, String> = HashMap::from([
        ("CREATORSCOUT_ADS_BASE_URL", uri.clone()),
        ("CREATORSCOUT_WEB_BASE_URL", uri),
        ("CREATORSCOUT_NETWORK_WAIT_TIMEOUT_MS", "300".to_owned()),
        ("CREATORSCOUT_DISCOVERY_RETRY_DELAY_MS", "1".to_owned()),
        ("CREATORSCOUT_DISCOVERY_PAGE_DELAY_MS", "0".to_owned()),
        ("CREATORSCOUT_POOL_RETRY_LIMIT", "1".to_owned()),
        ("CREATORSCOUT_POOL_RETRY_DELAY_MS", "1".to_owned()),
        ("CREATORSCOUT_POOL_TASK_TIMEOUT_SECS", "5".to_owned()),
        ("CREATORSCOUT_SCROLL_DELAY_MS", "0".to_owned()),
        ("CREATORSCOUT_ENRICH_VIDEOS", enrich.to_string()),
    ]);
    build_app_config(|key| vars.get(key).cloned().ok_or(VarError::NotPresent))
        .expect("test config is valid")
}

fn browser_with_profile(profile: Visit) -> Arc<FakeDriver> {
    let driver = Arc::new(FakeDriver::new());
    driver.route(
        CREATOR_PAGE,
        Visit {
            requests: vec![request(
                "https://ads.test/creative_radar_api/v1/popular_trend/creator/list?page=1",
                &[
                    ("timestamp", "1700000000"),
                    ("user-sign", "sig"),
                    ("anonymous-user-id", "anon"),
                ],
            )],
            ..Visit::default()
        },
    );
    driver.route(
        "/tag/skincare",
        Visit {
            responses: vec![
                response("https://web.test/tag/skincare?lang=en", 200, "<html/>"),
                json_response(
                    "https://web.test/api/challenge/item_list/",
                    &item_list(
                        0,
                        false,
                        &[
                            item("v1", "alice", 1_000_000, 80_000),
                            item("x1", "lurker", 1_000, 1),
                        ],
                    ),
                ),
            ],
            ..Visit::default()
        },
    );
    driver.route("/@alice", profile);
    driver
}

fn scripted_browser() -> Arc<FakeDriver> {
    browser_with_profile(Visit {
        responses: vec![
            response("https://web.test/@alice", 200, profile_page("alice", 2)),
            json_response(
                "https://web.test/api/post/item_list/",
                &item_list(
                    1,
                    false,
                    &[
                        item("v1", "alice", 1_000_000, 80_000),
                        item("v2", "alice", 200_000, 10_000),
                    ],
                ),
            ),
        ],
        ..Visit::default()
    })
}

async fn mount_platform(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/creative_radar_api/v1/popular_trend/hashtag/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "OK",
            "data": {
                "list": [{
                    "hashtag_id": "h-1",
                    "hashtag_name": "skincare",
                    "country_info": {"id": "ID", "value": "Indonesia", "label": "ID"},
                    "industry_info": {"id": 14_000_000_000_i64, "value": "Beauty", "label": "beauty"},
                    "publish_cnt": 10,
                    "video_views": 100
                }],
                "pagination": {"page": 1, "size": 50, "total": 1, "has_more": false}
            }
        })))
        .mount(server)
        .await;
}

fn video_page(id: &str) -> String {
    let detail: Value = json!({
        "statusCode": 0,
        "itemInfo": {"itemStruct": {
            "id": id,
            "author": {"id": "uid-alice", "uniqueId": "alice"},
            "suggestedWords": ["serum"],
            "diversificationLabels": ["Beauty"]
        }}
    });
    rehydration_page(&json!({"__DEFAULT_SCOPE__": {"webapp.video-detail": detail}}))
}

#[tokio::test]
async fn harvest_stores_hashtags_creators_and_videos() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let driver = scripted_browser();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let harvester = Harvester::from_config(
        &config(&server, false),
        Arc::clone(&driver),
        store.clone(),
        notifier.clone(),
    )
    .unwrap();

    let report = harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();

    assert_eq!(report.hashtags, 1);
    assert_eq!(report.candidate_creators, 1, "lurker is below the thresholds");
    assert_eq!(report.creators, 1);
    assert_eq!(report.videos, 2);
    assert_eq!(report.skipped_items, 0);

    let alice = store.creator("alice").await.unwrap();
    assert!(alice.industries.contains(INDUSTRY));
    assert_eq!(alice.counts.view_count, 1_200_000);
    assert_eq!(alice.counts.follower_count, 12000);
    assert_eq!(alice.contact.email.as_deref(), Some("alice@studio.example"));
    assert!(!alice.visibility);
    assert_eq!(
        store.video("v1").await.unwrap().source_hashtag.as_deref(),
        Some("skincare")
    );

    let messages = notifier.messages();
    assert!(messages.iter().any(|m| m.starts_with("Get hashtags complete, got 1 hashtags in ")));
    assert!(messages.iter().any(|m| m.starts_with("Get creators complete, got 1 creators and 2 videos")));
    assert!(messages.last().unwrap().starts_with("Harvest complete"));
    assert_eq!(driver.visits(CREATOR_PAGE), 1, "one bootstrap for the whole run");
}

#[tokio::test]
async fn videos_of_undetailed_creators_are_not_stored() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let driver = browser_with_profile(Visit {
        responses: vec![response("https://web.test/@alice", 200, "<html>broken</html>")],
        ..Visit::default()
    });
    let store = Arc::new(MemoryStore::new());
    let harvester = Harvester::from_config(
        &config(&server, false),
        Arc::clone(&driver),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    let report = harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();

    assert_eq!(report.candidate_creators, 1);
    assert_eq!(report.creators, 0);
    assert_eq!(report.videos, 0);
    assert_eq!(report.skipped_items, 1);
    assert!(store.creator("alice").await.is_none());
    assert!(store.video("v1").await.is_none());
}

#[tokio::test]
async fn rejected_creator_batch_is_reported_and_run_completes() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let sink = Arc::new(RejectingSink::default().rejecting_creators());
    let notifier = Arc::new(RecordingNotifier::default());
    let harvester = Harvester::from_config(
        &config(&server, true),
        scripted_browser(),
        sink.clone(),
        notifier.clone(),
    )
    .unwrap();

    let report = harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();

    assert_eq!(report.hashtags, 1);
    assert_eq!(report.creators, 0);
    assert_eq!(report.videos, 0, "videos are not stored without their creator");
    assert_eq!(report.enriched_videos, 0);
    assert_eq!(report.sink_failures, 1);
    assert!(sink.inner.hashtag("skincare").await.is_some());
    assert!(sink.inner.snapshot().await.videos.is_empty());
    let messages = notifier.messages();
    assert!(messages.iter().any(|m| m.starts_with("Storing creators failed")));
    assert!(messages.last().unwrap().starts_with("Harvest complete"));
}

#[tokio::test]
async fn second_run_bumps_update_counts() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let store = Arc::new(MemoryStore::new());
    let harvester = Harvester::from_config(
        &config(&server, false),
        scripted_browser(),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();
    harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();

    assert_eq!(store.hashtag("skincare").await.unwrap().update_count, 1);
    assert_eq!(store.creator("alice").await.unwrap().update_count, 1);
    assert_eq!(store.snapshot().await.videos.len(), 2);
}

#[tokio::test]
async fn enrichment_pass_marks_creator_visible() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    for id in ["v1", "v2"] {
        Mock::given(method("GET"))
            .and(path(format!("/@alice/video/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(video_page(id)))
            .mount(&server)
            .await;
    }
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let harvester = Harvester::from_config(
        &config(&server, true),
        scripted_browser(),
        store.clone(),
        notifier.clone(),
    )
    .unwrap();

    let report = harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap();

    assert_eq!(report.enriched_videos, 2);
    assert!(store.creator("alice").await.unwrap().visibility);
    let enrichment = store.video("v2").await.unwrap().enrichment.unwrap();
    assert_eq!(enrichment.suggested_words, ["serum"]);
    assert!(notifier
        .messages()
        .iter()
        .any(|m| m.starts_with("Video details complete, enriched 2 videos of 1 creators")));
}

#[tokio::test]
async fn lost_browser_aborts_run_and_notifies() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let driver = scripted_browser();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let harvester = Harvester::from_config(
        &config(&server, false),
        Arc::clone(&driver),
        store.clone(),
        notifier.clone(),
    )
    .unwrap();
    driver.fail_open(true);

    let err = harvester.run("ID", &[INDUSTRY.to_owned()]).await.unwrap_err();

    assert!(err.to_string().contains("credential"), "got {err}");
    assert!(notifier.messages().last().unwrap().contains("aborted"));
    assert!(store.snapshot().await.hashtags.is_empty());
}

#[tokio::test]
async fn reference_data_sync_stores_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/creative_radar_api/v1/popular_trend/hashtag/filters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "OK",
            "data": {
                "country": [{"id": "ID", "value": "Indonesia", "label": "ID"}],
                "industry": [
                    {"id": 14_000_000_000_i64, "value": "Beauty", "label": "beauty"},
                    {"id": 22_000_000_000_i64, "value": "Games", "label": "games"}
                ]
            }
        })))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let harvester = Harvester::from_config(
        &config(&server, false),
        scripted_browser(),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    let (countries, industries) = harvester.sync_reference_data().await.unwrap();

    assert_eq!((countries, industries), (1, 2));
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.industries.len(), 2);
}

#[tokio::test]
async fn shutdown_closes_browser() {
    let server = MockServer::start().await;
    let driver = scripted_browser();
    let harvester = Harvester::from_config(
        &config(&server, false),
        Arc::clone(&driver),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    harvester.shutdown().await.unwrap();
    assert_eq!(driver.shutdowns(), 1);
}
