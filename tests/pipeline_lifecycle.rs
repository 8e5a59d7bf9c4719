//! End-to-end tests for the running pipeline against mock feed servers.
//!
//! Each test starts its own `MockServer` and pipeline with the refresh timer
//! disabled, so fetch cycles only happen through `refresh_and_wait` or a
//! feed list change.

use std::sync::Arc;
use std::time::Duration;

use feedsift::config::Config;
use feedsift::pipeline::{CycleReport, Pipeline, PipelineHandle, PipelineOptions};
use feedsift::settings::{FeedConfig, KeywordMode, Settings, SettingsHandle};
use feedsift::store::Snapshot;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

fn rss(items: &[(String, String)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| format!("<item><title>{title}</title><link>{link}</link></item>"))
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{body}</channel></rss>"#)
}

fn item(title: &str, n: usize) -> (String, String) {
    (title.to_string(), format!("https://news.example/{n}"))
}

async fn mount_feed(server: &MockServer, route: &str, items: &[(String, String)]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(items)))
        .mount(server)
        .await;
}

fn start(settings: SettingsHandle) -> PipelineHandle {
    let options = PipelineOptions {
        scheduled: false,
        ..PipelineOptions::default()
    };
    Pipeline::new(reqwest::Client::new(), settings, options).start()
}

async fn refresh(handle: &PipelineHandle) -> CycleReport {
    tokio::time::timeout(WAIT, handle.refresh_and_wait())
        .await
        .expect("fetch cycle timed out")
        .expect("pipeline closed")
}

async fn wait_for<F>(handle: &PipelineHandle, predicate: F) -> Arc<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(|s| predicate(s)))
        .await
        .expect("snapshot condition not reached")
        .expect("pipeline stopped");
    Arc::clone(&*snapshot)
}

// ============================================================================
// Fetch Cycles
// ============================================================================

#[tokio::test]
async fn test_repeated_cycles_do_not_duplicate_articles() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", &[item("Hello", 1), item("World", 2)]).await;

    let settings = SettingsHandle::new(Settings {
        feeds: vec![FeedConfig::new(format!("{}/feed", server.uri()), "News")],
        ..Settings::default()
    });
    let handle = start(settings);

    let first = refresh(&handle).await;
    let second = refresh(&handle).await;

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(handle.snapshot().all_articles.len(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_feed_does_not_affect_others() {
    let server = MockServer::start().await;
    mount_feed(&server, "/good", &[item("Good", 1)]).await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item><title>x"))
        .mount(&server)
        .await;

    let settings = SettingsHandle::new(Settings {
        feeds: vec![
            FeedConfig::new(format!("{}/good", server.uri()), "Good"),
            FeedConfig::new(format!("{}/bad", server.uri()), "Bad"),
            FeedConfig::new(format!("{}/garbage", server.uri()), "Garbage"),
            FeedConfig::new("ftp://example.com/feed", "Wrong Scheme"),
        ],
        ..Settings::default()
    });
    let handle = start(settings);

    let report = refresh(&handle).await;
    assert_eq!(report.feeds, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.succeeded, 2);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.all_articles.len(), 1);
    assert_eq!(snapshot.all_articles[0].source, "Good");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_eviction_across_cycles() {
    let server = MockServer::start().await;
    let first: Vec<_> = (0..100).map(|n| item(&format!("Old {n}"), n)).collect();
    mount_feed(&server, "/first", &first).await;
    mount_feed(&server, "/second", &[item("Fresh", 1000)]).await;

    let first_feed = FeedConfig::new(format!("{}/first", server.uri()), "First");
    let settings = SettingsHandle::new(Settings {
        feeds: vec![first_feed.clone()],
        ..Settings::default()
    });
    let handle = start(settings.clone());
    refresh(&handle).await;
    assert_eq!(handle.snapshot().all_articles.len(), 100);

    // Swapping the feed list triggers a fetch of the new list on its own
    settings.set_feeds(vec![
        first_feed.disabled(),
        FeedConfig::new(format!("{}/second", server.uri()), "Second"),
    ]);
    let snapshot = wait_for(&handle, |s| {
        s.all_articles.last().is_some_and(|a| a.title == "Fresh")
    })
    .await;

    assert_eq!(snapshot.all_articles.len(), 100);
    assert_eq!(snapshot.all_articles[0].title, "Old 1");

    handle.shutdown().await.unwrap();
}

// ============================================================================
// Reprocessing on Configuration Change
// ============================================================================

#[tokio::test]
async fn test_keyword_change_rematches_existing_articles() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        &[item("Tokio 2.0 released", 1), item("Weather report", 2)],
    )
    .await;

    let settings = SettingsHandle::new(Settings {
        feeds: vec![FeedConfig::new(format!("{}/feed", server.uri()), "News")],
        ..Settings::default()
    });
    let handle = start(settings.clone());
    refresh(&handle).await;
    assert!(handle.snapshot().matched_articles.is_empty());

    settings.set_keywords(vec!["tok?o".to_string()]);
    let snapshot = wait_for(&handle, |s| !s.matched_articles.is_empty()).await;

    assert_eq!(snapshot.matched_articles.len(), 1);
    assert_eq!(snapshot.matched_articles[0].title, "Tokio 2.0 released");
    assert_eq!(snapshot.matched_articles[0].matched_keywords, vec!["tok?o"]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_spam_keyword_removes_from_both_collections() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        &[item("Rust spam offer", 1), item("Rust release", 2)],
    )
    .await;

    let settings = SettingsHandle::new(Settings {
        feeds: vec![FeedConfig::new(format!("{}/feed", server.uri()), "News")],
        ..Settings::default()
    });
    settings.set_keywords(vec!["rust".to_string()]);
    let handle = start(settings.clone());
    refresh(&handle).await;
    assert_eq!(handle.snapshot().matched_articles.len(), 2);

    settings.set_negative_keywords(vec!["spam".to_string()]);
    let snapshot = wait_for(&handle, |s| s.all_articles.len() == 1).await;

    assert_eq!(snapshot.all_articles[0].title, "Rust release");
    assert_eq!(snapshot.matched_articles.len(), 1);
    assert_eq!(snapshot.matched_articles[0].title, "Rust release");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_feed_mode_change_applies_to_stored_articles() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", &[item("Kernel news", 1)]).await;

    let feed = FeedConfig::new(format!("{}/feed", server.uri()), "LWN").with_keywords(["kernel"]);
    let settings = SettingsHandle::new(Settings {
        feeds: vec![feed],
        ..Settings::default()
    });
    let handle = start(settings.clone());
    refresh(&handle).await;
    // GlobalOnly with no global keywords
    assert!(handle.snapshot().matched_articles.is_empty());

    settings.update_feeds(|feeds| feeds[0].keyword_mode = KeywordMode::FeedOnly);
    let snapshot = wait_for(&handle, |s| !s.matched_articles.is_empty()).await;
    assert_eq!(snapshot.matched_articles[0].matched_keywords, vec!["kernel"]);

    handle.shutdown().await.unwrap();
}

// ============================================================================
// Configuration File to Running Pipeline
// ============================================================================

#[tokio::test]
async fn test_pipeline_from_config_file() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss", &[item("Async Rust", 1), item("Gardening", 2)]).await;

    let toml = format!(
        r#"
refresh_interval_secs = 900
keywords = ["async"]

[[feeds]]
url = "{}/rss"
name = "Blog"
"#,
        server.uri()
    );
    let config = Config::parse(&toml).unwrap();
    let options = PipelineOptions {
        fetch: config.fetch_options(),
        scheduled: false,
    };
    let handle = Pipeline::new(
        reqwest::Client::new(),
        SettingsHandle::new(config.to_settings()),
        options,
    )
    .start();

    let report = refresh(&handle).await;
    assert_eq!(report.inserted, 2);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.matched_articles.len(), 1);
    assert_eq!(snapshot.matched_articles[0].title, "Async Rust");

    let json = serde_json::to_value(&*snapshot).unwrap();
    assert_eq!(json["matched_articles"][0]["source"], "Blog");
    assert_eq!(json["all_articles"].as_array().map(Vec::len), Some(2));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropping_settings_handle_keeps_pipeline_running() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", &[item("Still here", 1)]).await;

    let settings = SettingsHandle::new(Settings {
        feeds: vec![FeedConfig::new(format!("{}/feed", server.uri()), "News")],
        ..Settings::default()
    });
    let handle = start(settings);

    let report = refresh(&handle).await;
    assert_eq!(report.inserted, 1);

    handle.shutdown().await.unwrap();
}
