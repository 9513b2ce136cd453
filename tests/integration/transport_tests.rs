//! Retry policy of the HTTP transport

use forum_archiver::config::{CrawlerConfig, UserAgentConfig};
use forum_archiver::transport::{HttpTransport, Transport, TransportRequest};
use forum_archiver::ArchiveError;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_transport(server: &MockServer, max_retries: u32) -> HttpTransport {
    let user_agent = UserAgentConfig {
        crawler_name: "TestArchiver".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/about".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    let crawler = CrawlerConfig {
        max_retries,
        retry_backoff_ms: 10,
        ..CrawlerConfig::default()
    };
    HttpTransport::from_config(&user_agent, &crawler, &server.uri()).unwrap()
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/community/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/community/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let transport = create_transport(&server, 3);
    let body = transport.fetch(&TransportRequest::get("/community/")).await.unwrap();

    assert_eq!(body, "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = create_transport(&server, 2);
    let err = transport.fetch(&TransportRequest::get("/questions")).await.unwrap_err();

    match err {
        ArchiveError::Transport { message, .. } => assert!(message.contains("after 2 retries"), "{}", message),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_error_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = create_transport(&server, 3);
    let err = transport.fetch(&TransportRequest::get("/missing")).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Transport { .. }));
    assert!(!err.is_fatal());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_sends_form_and_keeps_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/community/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/m/community/ajax.php"))
        .and(body_string_contains("a=fetch_topics"))
        .and(header("cookie", "sid=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = create_transport(&server, 0);
    transport.fetch(&TransportRequest::get("/community/")).await.unwrap();
    let request = TransportRequest::post("/m/community/ajax.php", vec![("a".into(), "fetch_topics".into())]);
    tokio::time::timeout(Duration::from_secs(5), transport.fetch(&request))
        .await
        .unwrap()
        .unwrap();
}
