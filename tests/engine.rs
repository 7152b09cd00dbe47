//! End-to-end tests driving the engine against mock feed servers.

use chrono::{Duration as ChronoDuration, Utc};
use feedrack::storage::{JsonFileStore, MemoryStore};
use feedrack::{Config, Effect, Engine, FeedsOrder, OpenPayload};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss_feed(title: &str, items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(guid, item_title, pub_date)| {
            format!(
                "<item><guid>{guid}</guid><title>{item_title}</title>\
                 <link>https://example.com/{guid}</link>\
                 <pubDate>{pub_date}</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>{title}</title>
    <link>https://example.com</link>
    <description>{title} entries</description>
    {items}
</channel></rss>"#
    )
}

fn config(sources: Vec<String>, items_limit: usize) -> Config {
    Config {
        sources,
        refresh_interval_minutes: 0,
        items_limit,
        feeds_order: FeedsOrder::Name,
        enable_preview: true,
    }
}

/// Wait until a refresh cycle has populated the store with `n` feeds.
async fn wait_for_feeds(engine: &Engine, n: usize) {
    let store = engine.store();
    for _ in 0..500 {
        if store.lock().await.feeds().len() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Timed out waiting for {} feeds, saw {}",
        n,
        store.lock().await.feeds().len()
    );
}

const OLD_DATE: &str = "Mon, 01 Jan 2024 10:00:00 GMT";

#[tokio::test]
async fn test_mixed_batch_truncates_and_isolates_failure() {
    let server = MockServer::start().await;
    let body = rss_feed(
        "Feed A",
        &[
            ("a1", "One", OLD_DATE),
            ("a2", "Two", OLD_DATE),
            ("a3", "Three", OLD_DATE),
            ("a4", "Four", OLD_DATE),
            ("a5", "Five", OLD_DATE),
        ],
    );
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let url_a = format!("{}/feed.xml", server.uri());
    // Nothing listens on port 9 locally
    let url_b = "http://127.0.0.1:9/feed.xml".to_string();

    let engine = Engine::new(
        config(vec![url_a.clone(), url_b.clone()], 2),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    wait_for_feeds(&engine, 2).await;

    let store = engine.store();
    let store = store.lock().await;

    let a = store.feed(&url_a).unwrap();
    assert!(a.feed.error.is_none());
    let guids: Vec<_> = a.feed.items.iter().map(|i| i.guid.as_str()).collect();
    assert_eq!(guids, vec!["a1", "a2"]);
    assert_eq!(a.nb_unread, 2);

    let b = store.feed(&url_b).unwrap();
    assert!(b.feed.error.is_some());
    assert!(b.feed.items.is_empty());
    assert!(b.feed.title.is_none());
}

#[tokio::test]
async fn test_http_404_feed_listed_with_error_decoration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let engine = Engine::new(config(vec![url.clone()], 10), Arc::new(MemoryStore::new())).unwrap();
    wait_for_feeds(&engine, 1).await;

    let records = engine.search("").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, format!("{} [ERROR]", url));
    assert_eq!(records[0].description, "HTTP error 404");
    assert_eq!(records[0].icon, "#fa fa-exclamation");

    // Selecting the errored feed yields no items, not a crash
    assert!(engine.search(&url).await.is_empty());
}

#[tokio::test]
async fn test_open_marks_read_and_reports_url() {
    let server = MockServer::start().await;
    let body = rss_feed("Feed", &[("g1", "Post", OLD_DATE), ("g2", "Other", OLD_DATE)]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let engine = Engine::new(config(vec![url.clone()], 10), Arc::new(MemoryStore::new())).unwrap();
    wait_for_feeds(&engine, 1).await;

    let records = engine.search(&url).await;
    assert_eq!(records.len(), 2);
    let payload = records[0].payload.clone().unwrap();
    assert_eq!(payload.guid, "g1");

    let effect = engine.execute("open", &payload).await;
    assert_eq!(effect, Effect::OpenUrl("https://example.com/g1".to_string()));

    let store = engine.store();
    assert_eq!(store.lock().await.feed(&url).unwrap().nb_unread, 1);

    // Second open of the same item changes nothing
    engine.execute("open", &payload).await;
    assert_eq!(store.lock().await.feed(&url).unwrap().nb_unread, 1);
}

#[tokio::test]
async fn test_read_markers_survive_restart() {
    let server = MockServer::start().await;
    let body = rss_feed("Feed", &[("g1", "Post", OLD_DATE), ("g2", "Other", OLD_DATE)]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let url = format!("{}/feed.xml", server.uri());

    let engine = Engine::new(
        config(vec![url.clone()], 10),
        Arc::new(JsonFileStore::open(&state_path)),
    )
    .unwrap();
    wait_for_feeds(&engine, 1).await;

    let payload = OpenPayload {
        feed_url: url.clone(),
        guid: "g1".to_string(),
        link: None,
    };
    engine.execute("open", &payload).await;
    engine.shutdown().await;

    // Fresh process: same state file, new engine
    let engine = Engine::new(
        config(vec![url.clone()], 10),
        Arc::new(JsonFileStore::open(&state_path)),
    )
    .unwrap();
    wait_for_feeds(&engine, 1).await;

    let store = engine.store();
    let store = store.lock().await;
    let feed = store.feed(&url).unwrap();
    assert_eq!(feed.nb_unread, 1);
    assert!(feed.feed.items[0].read);
}

#[tokio::test]
async fn test_new_since_last_access_flag() {
    let server = MockServer::start().await;

    let initial = rss_feed("Feed", &[("old", "Old post", OLD_DATE)]);
    let future_date = (Utc::now() + ChronoDuration::hours(1)).to_rfc2822();
    let updated = rss_feed(
        "Feed",
        &[("new", "New post", &future_date), ("old", "Old post", OLD_DATE)],
    );

    // First fetch sees only the old item; later fetches see the update
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(initial))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(updated))
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let engine = Engine::new(config(vec![url.clone()], 10), Arc::new(MemoryStore::new())).unwrap();
    wait_for_feeds(&engine, 1).await;

    // Viewing the feed records last-access
    engine.search(&url).await;

    engine.refresh_now();
    let store = engine.store();
    for _ in 0..500 {
        if store.lock().await.feed(&url).map(|f| f.feed.items.len()) == Some(2) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let records = engine.search(&url).await;
    assert_eq!(records.len(), 2);
    assert!(records[0].fresh, "item published after last access must be new");
    assert!(!records[1].fresh, "item published before last access must not be new");
}

#[tokio::test]
async fn test_manual_refresh_during_cycle_stays_consistent() {
    let server = MockServer::start().await;
    let body = rss_feed("Slow", &[("s1", "Post", OLD_DATE)]);
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let engine = Engine::new(config(vec![url.clone()], 10), Arc::new(MemoryStore::new())).unwrap();

    // Hammer manual refresh while the startup cycle is still in flight
    for _ in 0..5 {
        engine.refresh_now();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    wait_for_feeds(&engine, 1).await;
    // Let any collapsed follow-up cycle finish too
    tokio::time::sleep(Duration::from_millis(500)).await;

    let store = engine.store();
    let store = store.lock().await;
    assert_eq!(store.feeds().len(), 1);
    let feed = store.feed(&url).unwrap();
    assert!(feed.feed.error.is_none());
    assert_eq!(feed.feed.items.len(), 1);
    assert_eq!(feed.nb_unread, 1);
}

#[tokio::test]
async fn test_preview_rendering_respects_toggle() {
    let server = MockServer::start().await;
    let body = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
    <item><guid>g1</guid><title>Post</title>
        <description>&lt;p&gt;Body text&lt;/p&gt;</description>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate></item>
</channel></rss>"#;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let payload = OpenPayload {
        feed_url: url.clone(),
        guid: "g1".to_string(),
        link: None,
    };

    let engine = Engine::new(config(vec![url.clone()], 10), Arc::new(MemoryStore::new())).unwrap();
    wait_for_feeds(&engine, 1).await;

    let html = engine.render_preview(&payload).await.unwrap();
    assert!(html.contains("<p>Body text</p>"));

    let mut disabled = config(vec![url.clone()], 10);
    disabled.enable_preview = false;
    engine.update_config(disabled);
    assert!(engine.render_preview(&payload).await.is_none());
}

#[tokio::test]
async fn test_feed_list_ordering_by_unread() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Busy",
            &[("b1", "P1", OLD_DATE), ("b2", "P2", OLD_DATE)],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quiet.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed("Quiet", &[("q1", "P1", OLD_DATE)])),
        )
        .mount(&server)
        .await;

    let quiet = format!("{}/quiet.xml", server.uri());
    let busy = format!("{}/busy.xml", server.uri());

    let mut cfg = config(vec![quiet, busy], 10);
    cfg.feeds_order = FeedsOrder::Unread;
    let engine = Engine::new(cfg, Arc::new(MemoryStore::new())).unwrap();
    wait_for_feeds(&engine, 2).await;

    let records = engine.search("").await;
    assert_eq!(records[0].title, "Busy (2)");
    assert_eq!(records[1].title, "Quiet (1)");
}
