//! AoPS crawl against a mock forum

use crate::common::*;
use forum_archiver::crawler::{CrawlJob, Orchestrator};
use forum_archiver::transport::HttpTransport;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body).insert_header("content-type", "text/html"))
        .mount(server)
        .await;
}

async fn mount_ajax(server: &MockServer, needle: &str, body: String) {
    Mock::given(method("POST"))
        .and(path("/m/community/ajax.php"))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_category_window_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(&server, "/community/", community_page()).await;
    mount_ajax(
        &server,
        &format!("fetch_before={}", INIT_TIME),
        topics_response(&[(101, INIT_TIME - 100)]),
    )
    .await;
    mount_ajax(
        &server,
        &format!("fetch_before={}", INIT_TIME - 100),
        topics_response(&[(102, INIT_TIME - 200)]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/m/community/ajax.php"))
        .and(body_string_contains("a=fetch_topics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response": {"no_more_topics": true}}"#))
        .with_priority(10)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/community/c6h101",
        topic_page("Topic one", 2, &[(11, 1, "alpha"), (12, 2, "beta")]),
    )
    .await;
    mount_html(
        &server,
        "/community/c6h102",
        topic_page("Topic two", 2, &[(21, 1, "gamma"), (22, 2, "delta")]),
    )
    .await;

    let config = create_test_config(&server.uri(), dir.path());
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &server.uri()).unwrap();
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new()).unwrap();

    orchestrator
        .run(
            &transport,
            &CrawlJob::AopsCategory {
                category: 6,
                newest_days: 0,
                oldest_days: 10,
            },
        )
        .await
        .unwrap();

    let first = read(dir.path().join("tmp/101/aops-c6h101p11.json"));
    assert_eq!(
        first,
        format!(
            r#"{{"text": "Topic one\n\nalpha\n\nbeta\n\n", "url": "{}/community/c6h101p11"}}"#,
            server.uri()
        )
    );
    assert!(dir.path().join("tmp/102/aops-c6h102p21.json").exists());
    assert_eq!(
        read(dir.path().join("logs/aops.log")),
        "category 6, topic_id: 101\ncategory 6, topic_id: 102\n"
    );
    assert!(!dir.path().join("error.log").exists());
}

#[tokio::test]
async fn test_single_topic_with_continuation() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        "/community/c6h103",
        topic_page("Long topic", 3, &[(31, 1, "one"), (32, 2, "two")]),
    )
    .await;
    mount_ajax(&server, "start_post_num=3", posts_response(&[(33, 3, "three $x$")])).await;

    let config = create_test_config(&server.uri(), dir.path());
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &server.uri()).unwrap();
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new()).unwrap();

    orchestrator
        .run(&transport, &CrawlJob::AopsTopic { category: 6, topic: 103 })
        .await
        .unwrap();

    let head = read(dir.path().join("tmp/103/aops-c6h103p31.json"));
    assert!(head.contains(r#""text": "Long topic\n\none\n\ntwo\n\n""#));
    let tail = read(dir.path().join("tmp/103/aops-c6h103p33.json"));
    assert!(tail.contains(r#""text": "Long topic\n\none\n\ntwo\n\nthree [imath]x[/imath]\n\n""#));

    let continuation = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/m/community/ajax.php")
        .unwrap();
    let body = String::from_utf8(continuation.body).unwrap();
    assert!(body.contains("a=fetch_posts_for_topic"));
    assert!(body.contains("aops_session_id=it-session"));
}
