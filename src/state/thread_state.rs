/// Fetch state for one paginated discussion thread
///
/// This module defines the posts, session credentials and accumulation state
/// the pagination engine works with while assembling a thread.
use std::collections::HashSet;
use std::fmt;

/// Anonymous session credentials bootstrapped from a page
///
/// Required to authorize continuation calls. Lives for one crawl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    /// Server clock in epoch seconds at bootstrap time
    pub server_time: i64,
}

/// Where a post came from in the server's response sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inclusion {
    /// Head window of the initial batch
    FromStart,

    /// Tail window of the initial batch ("not from start")
    FromEnd,

    /// Delivered by a continuation request
    FromContinuation,
}

/// A single post of a thread
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub post_id: i64,
    pub post_number: i64,
    pub canonical_text: String,
    pub inclusion: Inclusion,
}

/// Final status of a thread fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Every post the server announced was received
    Complete,

    /// The server stopped returning posts before the announced total
    Partial { fetched: usize, expected: usize },
}

impl ThreadStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial { fetched, expected } => {
                write!(f, "partial ({}/{} posts)", fetched, expected)
            }
        }
    }
}

/// Accumulation state of one thread
///
/// Posts are unique by `post_id` and kept in the order the server declared
/// them. Only distinct posts count towards `total_post_count`.
#[derive(Debug, Clone)]
pub struct ThreadFetchState {
    pub thread_id: i64,
    pub category_id: i64,
    pub title: String,
    pub total_post_count: usize,
    pub accumulated_posts: Vec<Post>,
    pub next_expected_post_number: i64,
    seen: HashSet<i64>,
}

impl ThreadFetchState {
    /// Creates an empty state for a thread
    pub fn new(thread_id: i64, category_id: i64, title: String, total_post_count: usize) -> Self {
        Self {
            thread_id,
            category_id,
            title,
            total_post_count,
            accumulated_posts: Vec::new(),
            next_expected_post_number: 1,
            seen: HashSet::new(),
        }
    }

    /// Accepts one batch and advances the expected post number
    ///
    /// Returns how many posts of the batch were new. The next expected
    /// number moves past both the new posts and the highest number seen, so
    /// an overlapping batch never causes a gap.
    pub fn accept_batch(&mut self, batch: &[Post]) -> usize {
        let mut added = 0;
        for post in batch {
            if self.seen.insert(post.post_id) {
                self.accumulated_posts.push(post.clone());
                added += 1;
            }
        }
        let after_new = self.next_expected_post_number + added as i64;
        let after_highest = batch.iter().map(|p| p.post_number + 1).max().unwrap_or(after_new);
        self.next_expected_post_number = after_new.max(after_highest);
        added
    }

    /// Number of distinct posts accumulated so far
    pub fn accumulated_count(&self) -> usize {
        self.accumulated_posts.len()
    }

    /// Returns true while the server has announced more posts than received
    pub fn needs_more(&self) -> bool {
        self.accumulated_count() < self.total_post_count
    }

    pub fn status(&self) -> ThreadStatus {
        if self.needs_more() {
            ThreadStatus::Partial {
                fetched: self.accumulated_count(),
                expected: self.total_post_count,
            }
        } else {
            ThreadStatus::Complete
        }
    }

    /// Renders the transcript accumulated so far
    ///
    /// The title comes first, then every post's text, each followed by a
    /// blank line.
    pub fn transcript(&self) -> String {
        let mut text = format!("{}\n\n", self.title);
        for post in &self.accumulated_posts {
            text.push_str(&post.canonical_text);
            text.push_str("\n\n");
        }
        text
    }
}
