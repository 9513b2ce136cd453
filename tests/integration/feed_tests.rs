//! Feeder against mock index daemons

use forum_archiver::config::FeedConfig;
use forum_archiver::feed::Feeder;
use forum_archiver::ArchiveError;
use reqwest::Client;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("41")).unwrap();
    fs::write(
        dir.path().join("41/mse41.json"),
        r#"{"tags": ["calculus"], "text": " Find $x$ ", "url": "https://math.stackexchange.com/questions/41/t?noredirect=1"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("batch.jsonl"),
        "{\"text\": \"a\", \"url\": \"https://artofproblemsolving.com/community/c6h1p2\"}\nnot json\n",
    )
    .unwrap();
    dir
}

async fn mount_daemon(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docid": 7})))
        .mount(server)
        .await;
}

fn feed_config(urls: Vec<String>) -> FeedConfig {
    FeedConfig {
        indexd_urls: urls,
        ..FeedConfig::default()
    }
}

#[tokio::test]
async fn test_feed_posts_documents_to_every_daemon() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_daemon(&first).await;
    mount_daemon(&second).await;
    let corpus = create_corpus();

    let feeder = Feeder::new(
        Client::new(),
        &feed_config(vec![format!("{}/index", first.uri()), format!("{}/index", second.uri())]),
    )
    .unwrap();
    let summary = feeder.feed(corpus.path(), false).await.unwrap();

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.skipped, 1);
    for server in [&first, &second] {
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        let doc: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(
            doc,
            json!({
                "content": "Find [imath]x[/imath]",
                "site": "math.stackexchange.com",
                "url": "https://math.stackexchange.com/questions/41/t?noredirect=1",
            })
        );
    }
}

#[tokio::test]
async fn test_preview_sends_nothing() {
    let server = MockServer::start().await;
    mount_daemon(&server).await;
    let corpus = create_corpus();

    let feeder = Feeder::new(Client::new(), &feed_config(vec![format!("{}/index", server.uri())])).unwrap();
    let summary = feeder.feed(corpus.path(), true).await.unwrap();

    assert_eq!(summary.sent, 2);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_daemon_aborts_feed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let corpus = create_corpus();

    let feeder = Feeder::new(Client::new(), &feed_config(vec![format!("{}/index", server.uri())])).unwrap();
    let err = feeder.feed(corpus.path(), false).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Feed(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bye_reaches_daemons_and_ignores_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/index"))
        .and(body_json(json!({"cmd": "BYE"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let feeder = Feeder::new(
        Client::new(),
        &feed_config(vec![format!("{}/index", server.uri()), "http://127.0.0.1:9/index".to_string()]),
    )
    .unwrap();
    feeder.bye().await;
}

#[tokio::test]
async fn test_progress_is_logged_past_a_thousand_documents() {
    let server = MockServer::start().await;
    mount_daemon(&server).await;
    let dir = TempDir::new().unwrap();
    let lines: String = (0..1001)
        .map(|i| format!("{{\"text\": \"t{}\", \"url\": \"https://math.stackexchange.com/questions/{}\"}}\n", i, i))
        .collect();
    fs::write(dir.path().join("bulk.jsonl"), lines).unwrap();

    let feeder = Feeder::new(Client::new(), &feed_config(vec![format!("{}/index", server.uri())])).unwrap();
    let summary = feeder.feed(dir.path(), false).await.unwrap();

    assert_eq!(summary.sent, 1001);
    assert_eq!(server.received_requests().await.unwrap().len(), 1001);
}
