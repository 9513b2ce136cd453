//! Art of Problem Solving community forum
//!
//! Topic pages embed their first posts and an anonymous session in the
//! bootstrap script. Everything after that comes from the JSON endpoint
//! `/m/community/ajax.php`, authorized by that session.

use crate::archive::RecordKey;
use crate::config::AopsConfig;
use crate::crawler::{Chunk, ContinuationRequest, ThreadOpening, ThreadRef, ThreadSource};
use crate::crawler::{TopicEntry, TopicIndex, TopicPage};
use crate::extract::{extract_bootstrap, BootstrapValue};
use crate::state::{Inclusion, Post, Session};
use crate::text::unescape_html;
use crate::transport::{Transport, TransportRequest};
use crate::{ArchiveError, Result};

const AJAX_PATH: &str = "/m/community/ajax.php";
const COMMUNITY_PATH: &str = "/community/";
const SESSION_KEY: &str = "AoPS.session";

/// AoPS adapter over a transport bound to the site root
pub struct AopsSource<T> {
    transport: T,
    root_url: String,
    file_prefix: String,
    marker: String,
}

impl<T: Transport> AopsSource<T> {
    pub fn new(transport: T, config: &AopsConfig) -> Self {
        Self {
            transport,
            root_url: config.root_url.trim_end_matches('/').to_string(),
            file_prefix: config.file_prefix.clone(),
            marker: config.bootstrap_marker.clone(),
        }
    }

    /// Record key of a chunk: `<prefix>-c<cat>h<topic>p<post>`, sharded by topic
    pub fn record_key(&self, chunk: &Chunk) -> RecordKey {
        RecordKey::new(
            chunk.thread.thread_id,
            format!(
                "{}-c{}h{}p{}",
                self.file_prefix, chunk.thread.category_id, chunk.thread.thread_id, chunk.first_post_id
            ),
        )
    }

    /// Public URL of the chunk's first post
    pub fn record_url(&self, chunk: &Chunk) -> String {
        format!(
            "{}/community/c{}h{}p{}",
            self.root_url, chunk.thread.category_id, chunk.thread.thread_id, chunk.first_post_id
        )
    }

    async fn bootstrap(&self, path: &str) -> Result<BootstrapValue> {
        let body = self.transport.fetch(&TransportRequest::get(path)).await?;
        extract_bootstrap(&body, &self.marker).ok_or_else(|| ArchiveError::ExtractionSyntax {
            context: path.to_string(),
        })
    }

    async fn ajax(&self, form: Vec<(String, String)>) -> Result<BootstrapValue> {
        let body = self.transport.fetch(&TransportRequest::post(AJAX_PATH, form)).await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        let root = BootstrapValue::from(json);
        match root.get("response") {
            Some(response) => Ok(response.clone()),
            None => Err(ArchiveError::field_missing("response", AJAX_PATH)),
        }
    }
}

impl<T: Transport> ThreadSource for AopsSource<T> {
    async fn open_thread(&self, thread: &ThreadRef) -> Result<ThreadOpening> {
        let path = self.topic_path(thread.category_id, thread.thread_id);
        let root = self.bootstrap(&path).await?;
        let session = parse_session(&root, &self.marker)?;

        let topic = root
            .path(&[self.marker.as_str(), "preload_cmty_data", "topic_data"])
            .ok_or_else(|| ArchiveError::field_missing("preload_cmty_data.topic_data", &path))?;

        let title = unescape_html(topic.require_str("topic_title", &path)?);
        let total_post_count = topic.require_i64("num_posts", &path)?.max(0) as usize;
        let posts = topic
            .require_seq("posts_data", &path)?
            .iter()
            .map(|post| {
                let inclusion = match post.get("show_from_start").and_then(BootstrapValue::as_bool) {
                    Some(true) => Inclusion::FromStart,
                    _ => Inclusion::FromEnd,
                };
                parse_post(post, inclusion, &path)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "topic {}: \"{}\" ({} posts, {} embedded)",
            thread.thread_id,
            title,
            total_post_count,
            posts.len()
        );

        Ok(ThreadOpening {
            title,
            total_post_count,
            posts,
            session,
        })
    }

    async fn fetch_more(&self, request: &ContinuationRequest) -> Result<Vec<Post>> {
        let form = form(&[
            ("topic_id", request.thread_id.to_string()),
            ("direction", "forwards".to_string()),
            ("start_post_id", "-1".to_string()),
            ("start_post_num", request.start_post_number.to_string()),
            ("show_from_time", "-1".to_string()),
            ("num_to_fetch", request.requested_count.to_string()),
            ("a", "fetch_posts_for_topic".to_string()),
            ("aops_logged_in", "false".to_string()),
            ("aops_user_id", request.session.user_id.clone()),
            ("aops_session_id", request.session.session_id.clone()),
        ]);
        let response = self.ajax(form).await?;
        let context = format!("posts of topic {}", request.thread_id);
        response
            .require_seq("posts", &context)?
            .iter()
            .map(|post| parse_post(post, Inclusion::FromContinuation, &context))
            .collect()
    }
}

impl<T: Transport> TopicIndex for AopsSource<T> {
    async fn open_session(&self) -> Result<Session> {
        let root = self
            .bootstrap(COMMUNITY_PATH)
            .await
            .map_err(|e| match e {
                ArchiveError::ExtractionSyntax { context } => {
                    ArchiveError::SessionUnavailable(format!("no bootstrap data at {}", context))
                }
                other => other,
            })?;
        let mut session = parse_session(&root, &self.marker)?;
        session.server_time = root
            .get(&self.marker)
            .ok_or_else(|| ArchiveError::SessionUnavailable(format!("no {} at {}", self.marker, COMMUNITY_PATH)))?
            .require_i64("init_time", COMMUNITY_PATH)?;
        Ok(session)
    }

    async fn fetch_topics(&self, category: i64, before: i64, session: &Session) -> Result<TopicPage> {
        let form = form(&[
            ("category_type", "forum".to_string()),
            ("log_visit", "0".to_string()),
            ("required_tag", String::new()),
            ("fetch_before", before.to_string()),
            ("user_id", "0".to_string()),
            ("fetch_archived", "0".to_string()),
            ("fetch_announcements", "0".to_string()),
            ("category_id", category.to_string()),
            ("a", "fetch_topics".to_string()),
            ("aops_logged_in", "false".to_string()),
            ("aops_user_id", session.user_id.clone()),
            ("aops_session_id", session.session_id.clone()),
        ]);
        let response = self.ajax(form).await?;

        let no_more = response
            .get("no_more_topics")
            .map(|v| v.as_bool().unwrap_or_else(|| v.as_i64().is_some_and(|n| n != 0)))
            .unwrap_or(false);
        if no_more {
            return Ok(TopicPage {
                topics: Vec::new(),
                no_more,
            });
        }

        let context = format!("topics of category {}", category);
        let topics = response
            .require_seq("topics", &context)?
            .iter()
            .map(|topic| TopicEntry {
                topic_id: topic.get("topic_id").and_then(BootstrapValue::as_i64),
                last_post_time: topic.get("last_post_time").and_then(BootstrapValue::as_i64),
            })
            .collect();
        Ok(TopicPage { topics, no_more })
    }

    fn topic_path(&self, category: i64, topic_id: i64) -> String {
        format!("/community/c{}h{}", category, topic_id)
    }
}

fn form(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Reads a scalar as text; ids arrive as strings or numbers
fn scalar_text(value: &BootstrapValue) -> Option<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_i64().map(|n| n.to_string()))
}

fn parse_session(root: &BootstrapValue, marker: &str) -> Result<Session> {
    let session = root
        .get(SESSION_KEY)
        .ok_or_else(|| ArchiveError::SessionUnavailable(format!("no {} in page", SESSION_KEY)))?;
    let session_id = session.get("id").and_then(scalar_text);
    let user_id = session.get("user_id").and_then(scalar_text);
    match (session_id, user_id) {
        (Some(session_id), Some(user_id)) => Ok(Session {
            session_id,
            user_id,
            server_time: root
                .path(&[marker, "init_time"])
                .and_then(BootstrapValue::as_i64)
                .unwrap_or_default(),
        }),
        _ => Err(ArchiveError::SessionUnavailable(format!(
            "{} lacks id or user_id",
            SESSION_KEY
        ))),
    }
}

fn parse_post(post: &BootstrapValue, inclusion: Inclusion, context: &str) -> Result<Post> {
    Ok(Post {
        post_id: post.require_i64("post_id", context)?,
        post_number: post.require_i64("post_number", context)?,
        canonical_text: post.require_str("post_canonical", context)?.to_string(),
        inclusion,
    })
}
