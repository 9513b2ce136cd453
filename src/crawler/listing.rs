//! Listing walkers
//!
//! Two addressing modes produce the items a crawl pass visits:
//!
//! - [`TimeWindowWalker`] walks a category backward through time, from
//!   `server_time - newest_days` down to `server_time - oldest_days`.
//! - [`PageWalker`] walks listing pages `begin..=end` forward.
//!
//! Both are pulled with `next().await` and yield either an item or an
//! explicit error element. Malformed entries are skipped one at a time.

use crate::crawler::pacer::{Pacer, Sleeper};
use crate::state::{format_epoch, ListingCursor, Session};
use crate::{ArchiveError, Result};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One thread or question discovered by a walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Category id or listing page the item was found on
    pub scope: String,
    pub id: i64,
    /// Site-relative path of the item
    pub path: String,
}

// ===== Time-windowed mode =====

/// Raw topic entry of a listing response; either field may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicEntry {
    pub topic_id: Option<i64>,
    pub last_post_time: Option<i64>,
}

/// One page of a category listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicPage {
    pub topics: Vec<TopicEntry>,
    /// Server signal that nothing older exists
    pub no_more: bool,
}

/// Category listing protocol
pub trait TopicIndex: Send + Sync {
    /// Bootstraps an anonymous session; fails with `SessionUnavailable`
    fn open_session(&self) -> impl Future<Output = Result<Session>> + Send;

    /// Fetches topics whose last activity is before `before`
    fn fetch_topics(
        &self,
        category: i64,
        before: i64,
        session: &Session,
    ) -> impl Future<Output = Result<TopicPage>> + Send;

    /// Site-relative path of a topic
    fn topic_path(&self, category: i64, topic_id: i64) -> String;
}

/// Walks a category backward through a time window
pub struct TimeWindowWalker<'a, I, P> {
    index: &'a I,
    pacer: &'a Pacer<P>,
    category: i64,
    newest_days: i64,
    oldest_days: i64,
    session: Option<Session>,
    cursor: ListingCursor,
    after: i64,
    buffer: VecDeque<ListingItem>,
    seen: HashSet<i64>,
}

impl<'a, I: TopicIndex, P: Sleeper> TimeWindowWalker<'a, I, P> {
    pub fn new(
        index: &'a I,
        pacer: &'a Pacer<P>,
        category: i64,
        newest_days: i64,
        oldest_days: i64,
    ) -> Self {
        Self {
            index,
            pacer,
            category,
            newest_days,
            oldest_days,
            session: None,
            cursor: ListingCursor::new(category.to_string(), i64::MAX),
            after: i64::MAX,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> &ListingCursor {
        &self.cursor
    }

    /// Session bootstrapped by the walk, once the first page was requested
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn scope(&self) -> String {
        format!("category {}", self.category)
    }

    fn fail(&mut self, error: ArchiveError) -> Option<Result<ListingItem>> {
        self.cursor.exhaust();
        Some(Err(ArchiveError::listing(self.scope(), error)))
    }

    /// Yields the next topic, an error element, or `None` when the walk ended
    pub async fn next(&mut self) -> Option<Result<ListingItem>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.cursor.exhausted {
                return None;
            }

            if self.session.is_none() {
                match self.pacer.guard(self.index.open_session()).await {
                    Ok(session) => {
                        let before = session.server_time - self.newest_days * SECONDS_PER_DAY;
                        self.after = session.server_time - self.oldest_days * SECONDS_PER_DAY;
                        self.cursor.bound = before;
                        self.session = Some(session);
                    }
                    Err(e) => return self.fail(e),
                }
            }

            if self.cursor.bound < self.after {
                self.cursor.exhaust();
                continue;
            }

            tracing::info!(
                "[category] {}, [before] {}, [after] {}",
                self.category,
                format_epoch(self.cursor.bound),
                format_epoch(self.after)
            );

            let page = {
                let Some(session) = self.session.as_ref() else {
                    continue;
                };
                self.pacer
                    .guard(self.index.fetch_topics(self.category, self.cursor.bound, session))
                    .await
            };
            let page = match page {
                Ok(page) => page,
                Err(e) => return self.fail(e),
            };

            if page.no_more || page.topics.is_empty() {
                self.cursor.exhaust();
                continue;
            }

            let mut oldest: Option<i64> = None;
            for entry in &page.topics {
                let (Some(id), Some(time)) = (entry.topic_id, entry.last_post_time) else {
                    tracing::warn!("category {}: skipping malformed topic entry {:?}", self.category, entry);
                    continue;
                };
                oldest = Some(oldest.map_or(time, |o| o.min(time)));
                if time < self.after || !self.seen.insert(id) {
                    continue;
                }
                self.buffer.push_back(ListingItem {
                    scope: self.category.to_string(),
                    id,
                    path: self.index.topic_path(self.category, id),
                });
            }

            match oldest {
                Some(time) => {
                    self.cursor.retreat_to(time);
                }
                None => self.cursor.exhaust(),
            }
        }
    }
}

// ===== Page-indexed mode =====

/// Raw item link of a listing page; unparsable fields are `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub id: Option<i64>,
    pub path: Option<String>,
}

/// Paged listing protocol
pub trait PageIndex: Send + Sync {
    fn fetch_page(&self, sort: &str, page: i64) -> impl Future<Output = Result<Vec<PageEntry>>> + Send;
}

/// Walks listing pages forward, backing off on empty pages
pub struct PageWalker<'a, I, P> {
    index: &'a I,
    pacer: &'a Pacer<P>,
    cursor: ListingCursor,
    end: i64,
    empty_page_retries: u32,
    empty_page_backoff: Duration,
    buffer: VecDeque<ListingItem>,
}

impl<'a, I: PageIndex, P: Sleeper> PageWalker<'a, I, P> {
    pub fn new(
        index: &'a I,
        pacer: &'a Pacer<P>,
        sort: &str,
        begin: i64,
        end: i64,
        empty_page_retries: u32,
        empty_page_backoff: Duration,
    ) -> Self {
        Self {
            index,
            pacer,
            cursor: ListingCursor::new(sort, begin),
            end,
            empty_page_retries,
            empty_page_backoff,
            buffer: VecDeque::new(),
        }
    }

    pub fn cursor(&self) -> &ListingCursor {
        &self.cursor
    }

    /// Yields the next question, an error element, or `None` past `end`
    pub async fn next(&mut self) -> Option<Result<ListingItem>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.cursor.exhausted {
                return None;
            }
            if self.cursor.bound > self.end {
                self.cursor.exhaust();
                return None;
            }

            let page = self.cursor.bound;
            let scope = format!("page {}", page);
            tracing::info!(
                "page#{} in [.., {}] order by {}",
                page,
                self.end,
                self.cursor.scope
            );

            match self.fetch_non_empty(page).await {
                Ok(entries) => {
                    let before = self.buffer.len();
                    for entry in entries {
                        match entry {
                            PageEntry {
                                id: Some(id),
                                path: Some(path),
                            } => self.buffer.push_back(ListingItem {
                                scope: page.to_string(),
                                id,
                                path,
                            }),
                            other => tracing::warn!("{}: skipping malformed entry {:?}", scope, other),
                        }
                    }
                    tracing::info!("{} questions in page {}", self.buffer.len() - before, page);
                    self.cursor.advance_page();
                }
                Err(e) if e.is_abort() => {
                    self.cursor.exhaust();
                    return Some(Err(e));
                }
                Err(e) => {
                    self.cursor.advance_page();
                    return Some(Err(ArchiveError::listing(scope, e)));
                }
            }
        }
    }

    /// Fetches a page, retrying while it comes back empty
    ///
    /// Retry `n` waits `n × empty_page_backoff`. After the ceiling the page
    /// fails.
    async fn fetch_non_empty(&self, page: i64) -> Result<Vec<PageEntry>> {
        let mut attempt = 0u32;
        loop {
            let entries = self
                .pacer
                .guard(self.index.fetch_page(&self.cursor.scope, page))
                .await?;
            if !entries.is_empty() {
                return Ok(entries);
            }
            if attempt >= self.empty_page_retries {
                return Err(ArchiveError::protocol(
                    &format!("page {}", page),
                    format!("still empty after {} retries", attempt),
                ));
            }
            attempt += 1;
            let wait = self.empty_page_backoff * attempt;
            tracing::warn!("Empty listing page {}, request too frequent? Wait {:?}", page, wait);
            self.pacer.pause(wait).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::pacer::testing::recording_pacer;
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;

    struct ScriptedTopics {
        pages: Mutex<VecDeque<Result<TopicPage>>>,
        befores: Mutex<Vec<i64>>,
        session_ok: bool,
    }

    impl ScriptedTopics {
        fn new(pages: Vec<Result<TopicPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                befores: Mutex::new(Vec::new()),
                session_ok: true,
            }
        }
    }

    impl TopicIndex for ScriptedTopics {
        async fn open_session(&self) -> Result<Session> {
            if !self.session_ok {
                return Err(ArchiveError::SessionUnavailable("no session".into()));
            }
            Ok(Session {
                session_id: "s".into(),
                user_id: "0".into(),
                server_time: NOW,
            })
        }

        async fn fetch_topics(&self, _category: i64, before: i64, _session: &Session) -> Result<TopicPage> {
            self.befores.lock().unwrap().push(before);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TopicPage { topics: vec![], no_more: true }))
        }

        fn topic_path(&self, category: i64, topic_id: i64) -> String {
            format!("/community/c{}h{}", category, topic_id)
        }
    }

    fn topic(id: i64, time: i64) -> TopicEntry {
        TopicEntry {
            topic_id: Some(id),
            last_post_time: Some(time),
        }
    }

    fn page(topics: Vec<TopicEntry>) -> Result<TopicPage> {
        Ok(TopicPage {
            topics,
            no_more: false,
        })
    }

    async fn drain<I: TopicIndex, P: Sleeper>(walker: &mut TimeWindowWalker<'_, I, P>) -> Vec<Result<ListingItem>> {
        let mut out = Vec::new();
        while let Some(item) = walker.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_time_window_cursor_strictly_decreases() {
        let index = ScriptedTopics::new(vec![
            page(vec![topic(1, NOW - 100), topic(2, NOW - 200)]),
            // same timestamp again plus a repeated topic
            page(vec![topic(2, NOW - 200), topic(3, NOW - 200)]),
            page(vec![topic(4, NOW - 5000)]),
        ]);
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 10);

        let items = drain(&mut walker).await;
        let ids: Vec<i64> = items.into_iter().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let befores = index.befores.lock().unwrap().clone();
        assert_eq!(befores[0], NOW);
        assert!(befores.windows(2).all(|w| w[1] < w[0]), "{:?}", befores);
    }

    #[tokio::test]
    async fn test_time_window_stops_at_oldest_bound() {
        let index = ScriptedTopics::new(vec![
            page(vec![topic(1, NOW - SECONDS_PER_DAY)]),
            page(vec![topic(2, NOW - 3 * SECONDS_PER_DAY)]),
        ]);
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 2);

        let ids: Vec<i64> = drain(&mut walker).await.into_iter().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec![1]);
        // the cursor crossed the bound, no third request
        assert_eq!(index.befores.lock().unwrap().len(), 2);
        assert!(walker.cursor().exhausted);
    }

    #[tokio::test]
    async fn test_time_window_honors_no_more_signal() {
        let index = ScriptedTopics::new(vec![Ok(TopicPage {
            topics: vec![topic(1, NOW - 10)],
            no_more: true,
        })]);
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 10);

        assert!(drain(&mut walker).await.is_empty());
    }

    #[tokio::test]
    async fn test_time_window_skips_malformed_entries() {
        let index = ScriptedTopics::new(vec![page(vec![
            TopicEntry {
                topic_id: None,
                last_post_time: Some(NOW - 5),
            },
            topic(9, NOW - 10),
        ])]);
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 10);

        let ids: Vec<i64> = drain(&mut walker).await.into_iter().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec![9]);
    }

    #[tokio::test]
    async fn test_time_window_yields_listing_error_then_ends() {
        let index = ScriptedTopics::new(vec![Err(ArchiveError::Transport {
            url: "/m/community/ajax.php".into(),
            message: "HTTP 500".into(),
        })]);
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 10);

        let items = drain(&mut walker).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(ArchiveError::Listing { .. })));
        assert!(!items[0].as_ref().unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_missing_session_is_fatal() {
        let mut index = ScriptedTopics::new(vec![]);
        index.session_ok = false;
        let (pacer, _) = recording_pacer();
        let mut walker = TimeWindowWalker::new(&index, &pacer, 6, 0, 10);

        let items = drain(&mut walker).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_fatal());
    }

    struct ScriptedPages {
        responses: Mutex<VecDeque<Result<Vec<PageEntry>>>>,
        requests: Mutex<Vec<(String, i64)>>,
    }

    impl ScriptedPages {
        fn new(responses: Vec<Result<Vec<PageEntry>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageIndex for ScriptedPages {
        async fn fetch_page(&self, sort: &str, page: i64) -> Result<Vec<PageEntry>> {
            self.requests.lock().unwrap().push((sort.to_string(), page));
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn entry(id: i64) -> PageEntry {
        PageEntry {
            id: Some(id),
            path: Some(format!("/questions/{}/title", id)),
        }
    }

    #[tokio::test]
    async fn test_empty_page_backs_off_twice_then_yields() {
        let index = ScriptedPages::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![entry(5), entry(6)])]);
        let (pacer, sleeper) = recording_pacer();
        let backoff = Duration::from_secs(10);
        let mut walker = PageWalker::new(&index, &pacer, "newest", 1, 1, 60, backoff);

        let first = walker.next().await.unwrap().unwrap();
        assert_eq!(first.id, 5);
        assert_eq!(sleeper.calls(), vec![backoff, backoff * 2]);

        assert_eq!(walker.next().await.unwrap().unwrap().id, 6);
        assert!(walker.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_page_past_ceiling_is_error_element() {
        let index = ScriptedPages::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![]), Ok(vec![entry(7)])]);
        let (pacer, sleeper) = recording_pacer();
        let mut walker = PageWalker::new(&index, &pacer, "newest", 1, 2, 2, Duration::from_secs(1));

        let first = walker.next().await.unwrap();
        assert!(matches!(first, Err(ArchiveError::Listing { .. })));
        assert_eq!(sleeper.calls().len(), 2);

        // the walk moves on to page 2
        assert_eq!(walker.next().await.unwrap().unwrap().id, 7);
        let pages: Vec<i64> = index.requests.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(pages, vec![1, 1, 1, 2]);
    }

    #[tokio::test]
    async fn test_transport_error_continues_with_next_page() {
        let index = ScriptedPages::new(vec![
            Err(ArchiveError::Transport {
                url: "/questions".into(),
                message: "timeout".into(),
            }),
            Ok(vec![entry(8)]),
        ]);
        let (pacer, _) = recording_pacer();
        let mut walker = PageWalker::new(&index, &pacer, "active", 3, 4, 60, Duration::ZERO);

        assert!(walker.next().await.unwrap().is_err());
        let item = walker.next().await.unwrap().unwrap();
        assert_eq!(item.id, 8);
        assert_eq!(item.scope, "4");
        assert_eq!(index.requests.lock().unwrap()[0], ("active".to_string(), 3));
    }

    #[tokio::test]
    async fn test_page_walker_skips_malformed_entries() {
        let index = ScriptedPages::new(vec![Ok(vec![
            PageEntry {
                id: None,
                path: Some("/questions/x".into()),
            },
            entry(11),
        ])]);
        let (pacer, _) = recording_pacer();
        let mut walker = PageWalker::new(&index, &pacer, "newest", 1, 1, 60, Duration::ZERO);

        assert_eq!(walker.next().await.unwrap().unwrap().id, 11);
        assert!(walker.next().await.is_none());
    }
}
