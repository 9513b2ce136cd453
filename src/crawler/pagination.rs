//! Pagination engine
//!
//! Reassembles one thread from a session-bound, paginated API.
//!
//! ```text
//! INITIAL_PARSE ──> ACCUMULATING ──> COMPLETE
//!       │                │
//!       └──────┬─────────┘
//!              v
//!           FAILED
//! ```
//!
//! The initial batch may hold a head window and a tail window of the thread.
//! Tail posts are dropped before accumulation starts, otherwise they would
//! land ahead of the posts fetched by continuation calls.

use crate::archive::WriteOutcome;
use crate::crawler::pacer::{Pacer, Sleeper};
use crate::state::{Inclusion, Post, Session, ThreadFetchState, ThreadStatus};
use crate::Result;
use std::future::Future;
use std::time::Duration;

/// Identifies one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadRef {
    pub category_id: i64,
    pub thread_id: i64,
}

/// What the first page of a thread yields
#[derive(Debug, Clone)]
pub struct ThreadOpening {
    pub title: String,
    pub total_post_count: usize,
    pub posts: Vec<Post>,
    pub session: Session,
}

/// Parameters of a "fetch more" call
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationRequest {
    pub thread_id: i64,
    pub start_post_number: i64,
    pub requested_count: u32,
    pub session: Session,
}

/// Site protocol behind the engine
pub trait ThreadSource: Send + Sync {
    /// Fetches the first page and its bootstrap data
    fn open_thread(&self, thread: &ThreadRef) -> impl Future<Output = Result<ThreadOpening>> + Send;

    /// Requests posts going forward from `start_post_number`
    fn fetch_more(
        &self,
        request: &ContinuationRequest,
    ) -> impl Future<Output = Result<Vec<Post>>> + Send;
}

/// One materialized snapshot of a thread, emitted per pagination round
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub thread: ThreadRef,
    /// Zero-based round number
    pub index: usize,
    /// Identifier the chunk is archived under
    pub first_post_id: i64,
    pub first_post_number: i64,
    /// Title and every post accumulated up to the end of this round
    pub text: String,
}

/// Result of assembling one thread
#[derive(Debug, Clone)]
pub struct ThreadReport {
    pub status: ThreadStatus,
    pub outcomes: Vec<WriteOutcome>,
    pub state: ThreadFetchState,
}

/// Drives the state machine for one thread at a time
pub struct PaginationEngine<'a, S, P> {
    source: &'a S,
    pacer: &'a Pacer<P>,
    continuation_delay: Duration,
    posts_per_request: u32,
}

impl<'a, S: ThreadSource, P: Sleeper> PaginationEngine<'a, S, P> {
    pub fn new(
        source: &'a S,
        pacer: &'a Pacer<P>,
        continuation_delay: Duration,
        posts_per_request: u32,
    ) -> Self {
        Self {
            source,
            pacer,
            continuation_delay,
            posts_per_request,
        }
    }

    /// Assembles a thread, handing each chunk to `sink` as it is produced
    ///
    /// An error from the source or the sink aborts this thread only; the
    /// caller decides whether the walk goes on.
    pub async fn assemble<F>(&self, thread: ThreadRef, mut sink: F) -> Result<ThreadReport>
    where
        F: FnMut(&Chunk) -> Result<WriteOutcome>,
    {
        // INITIAL_PARSE
        let opening = self.pacer.guard(self.source.open_thread(&thread)).await?;
        let mut state = ThreadFetchState::new(
            thread.thread_id,
            thread.category_id,
            opening.title,
            opening.total_post_count,
        );
        let session = opening.session;
        let mut batch: Vec<Post> = opening
            .posts
            .into_iter()
            .filter(|post| post.inclusion != Inclusion::FromEnd)
            .collect();

        // ACCUMULATING
        let mut outcomes = Vec::new();
        while state.needs_more() && !batch.is_empty() {
            let first = &batch[0];
            let (first_post_id, first_post_number) = (first.post_id, first.post_number);
            if state.accept_batch(&batch) == 0 {
                // nothing new: the server is repeating itself
                break;
            }

            let chunk = Chunk {
                thread,
                index: outcomes.len(),
                first_post_id,
                first_post_number,
                text: state.transcript(),
            };
            outcomes.push(sink(&chunk)?);

            if !state.needs_more() {
                break;
            }

            self.pacer.pause(self.continuation_delay).await?;
            let request = ContinuationRequest {
                thread_id: thread.thread_id,
                start_post_number: state.next_expected_post_number,
                requested_count: self.posts_per_request,
                session: session.clone(),
            };
            tracing::debug!(
                "topic {}: fetching posts from #{}",
                thread.thread_id,
                request.start_post_number
            );
            batch = self.pacer.guard(self.source.fetch_more(&request)).await?;
        }

        // COMPLETE
        let status = state.status();
        if let ThreadStatus::Partial { fetched, expected } = status {
            tracing::warn!(
                "topic {}: server stopped after {} of {} posts",
                thread.thread_id,
                fetched,
                expected
            );
        }

        Ok(ThreadReport {
            status,
            outcomes,
            state,
        })
    }
}
