//! StackExchange crawl against a mock site

use crate::common::*;
use forum_archiver::crawler::{CrawlJob, Orchestrator};
use forum_archiver::transport::HttpTransport;
use std::time::SystemTime;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/questions"))
        .and(query_param("page", "1"))
        .and(query_param("sort", "newest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[41, 42])))
        .mount(server)
        .await;
    for id in [41, 42] {
        Mock::given(method("GET"))
            .and(path(format!("/questions/{id}/title-{id}")))
            .and(query_param("noredirect", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(question_page(
                &format!("Question {id}"),
                "Evaluate $\\int x$",
                "Use \\(x^2/2\\)",
            )))
            .mount(server)
            .await;
    }
}

fn mtime(path: &std::path::Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

#[tokio::test]
async fn test_listing_pages_archive_questions_idempotently() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_site(&server).await;

    let config = create_test_config(&server.uri(), dir.path());
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &server.uri()).unwrap();
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new()).unwrap();
    let job = CrawlJob::StackExchangePages { begin: 1, end: 1 };

    orchestrator.run(&transport, &job).await.unwrap();

    let record_path = dir.path().join("tmp/41/mse41.json");
    let record = read(&record_path);
    assert_eq!(
        record,
        format!(
            r#"{{"tags": ["calculus"], "text": "Question 41\n\nEvaluate [imath]\\int x[/imath]\n\n\nUse [imath]x^2/2[/imath]\n\n\n", "url": "{}/questions/41/title-41?noredirect=1"}}"#,
            server.uri()
        )
    );
    assert!(dir.path().join("tmp/42/mse42.json").exists());
    assert_eq!(
        read(dir.path().join("logs/mse.log")),
        "page 1, post_id: 41\npage 1, post_id: 42\n"
    );

    // a second pass over unchanged pages leaves the records alone
    let before = mtime(&record_path);
    orchestrator.run(&transport, &job).await.unwrap();
    assert_eq!(mtime(&record_path), before);
}

#[tokio::test]
async fn test_failed_question_is_logged_and_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/questions/41/title-41"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_site(&server).await;

    let config = create_test_config(&server.uri(), dir.path());
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &server.uri()).unwrap();
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new()).unwrap();

    orchestrator
        .run(&transport, &CrawlJob::StackExchangePages { begin: 1, end: 1 })
        .await
        .unwrap();

    assert!(!dir.path().join("tmp/41/mse41.json").exists());
    assert!(dir.path().join("tmp/42/mse42.json").exists());
    let errors = read(dir.path().join("error.log"));
    assert!(errors.starts_with("[error] post "), "{}", errors);
    assert!(errors.contains("HTTP 404"));
}
