//! Shared test configuration and page fixtures

use forum_archiver::config::{
    AopsConfig, ArchiveConfig, Config, CrawlerConfig, FeedConfig, StackExchangeConfig, UserAgentConfig,
};
use serde_json::{json, Value};
use std::path::Path;

pub const INIT_TIME: i64 = 1_700_000_000;

/// Creates a test configuration pointing both sites at `base_url`
pub fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            item_delay_ms: 0,
            continuation_delay_ms: 0,
            retry_backoff_ms: 10,
            empty_page_backoff_ms: 10,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        archive: ArchiveConfig {
            root: dir.join("tmp"),
            log_dir: dir.join("logs"),
            error_log: dir.join("error.log"),
            ..ArchiveConfig::default()
        },
        aops: AopsConfig {
            root_url: base_url.to_string(),
            ..AopsConfig::default()
        },
        stackexchange: StackExchangeConfig {
            root_url: Some(base_url.to_string()),
            ..StackExchangeConfig::default()
        },
        feed: FeedConfig::default(),
    }
}

fn bootstrap_page(bootstrap: Value) -> String {
    format!(
        "<html><head><script>\nAoPS.bootstrap_data = {};\nAoPS.session = {};\n</script></head><body></body></html>",
        bootstrap,
        json!({"id": "it-session", "user_id": "0"})
    )
}

pub fn community_page() -> String {
    bootstrap_page(json!({"init_time": INIT_TIME}))
}

/// `(post_id, post_number, text)`; every post is flagged as shown from the start
pub fn topic_page(title: &str, num_posts: usize, posts: &[(i64, i64, &str)]) -> String {
    let posts: Vec<Value> = posts
        .iter()
        .map(|(id, number, text)| {
            json!({"post_id": id, "post_number": number, "post_canonical": text, "show_from_start": true})
        })
        .collect();
    bootstrap_page(json!({
        "init_time": INIT_TIME,
        "preload_cmty_data": {
            "topic_data": {"topic_title": title, "num_posts": num_posts, "posts_data": posts}
        }
    }))
}

pub fn topics_response(topics: &[(i64, i64)]) -> String {
    let topics: Vec<Value> = topics
        .iter()
        .map(|(id, time)| json!({"topic_id": id, "last_post_time": time}))
        .collect();
    json!({"response": {"topics": topics}}).to_string()
}

pub fn posts_response(posts: &[(i64, i64, &str)]) -> String {
    let posts: Vec<Value> = posts
        .iter()
        .map(|(id, number, text)| json!({"post_id": id, "post_number": number, "post_canonical": text}))
        .collect();
    json!({"response": {"posts": posts}}).to_string()
}

pub fn listing_page(ids: &[i64]) -> String {
    let summaries: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="question-summary" id="question-summary-{id}"><h3><a class="question-hyperlink" href="/questions/{id}/title-{id}">Q{id}</a></h3></div>"#
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", summaries)
}

pub fn question_page(title: &str, body: &str, answer: &str) -> String {
    format!(
        r#"<html><body>
          <div id="question-header"><h1>{title}</h1></div>
          <div id="question"><p>{body}</p><a class="post-tag">calculus</a></div>
          <div id="answers"><div class="answer"><p>{answer}</p></div></div>
        </body></html>"#
    )
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}
