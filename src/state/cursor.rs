//! Listing cursor shared by both walker modes
//!
//! The cursor only ever moves one way: time bounds strictly decrease and
//! page numbers strictly increase, so a walk cannot revisit a window.

use chrono::{DateTime, Utc};
use std::fmt;

/// Position of a listing walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCursor {
    /// Category id (time-windowed) or sort order (page-indexed)
    pub scope: String,

    /// Current `fetch_before` timestamp or current page number
    pub bound: i64,

    pub exhausted: bool,
}

impl ListingCursor {
    pub fn new(scope: impl Into<String>, bound: i64) -> Self {
        Self {
            scope: scope.into(),
            bound,
            exhausted: false,
        }
    }

    /// Moves a time bound back to `oldest_seen`
    ///
    /// The new bound is forced strictly below the current one even when the
    /// server returns items at or after it. Returns the new bound.
    pub fn retreat_to(&mut self, oldest_seen: i64) -> i64 {
        self.bound = oldest_seen.min(self.bound - 1);
        self.bound
    }

    /// Moves a page cursor to the next page. Returns the new page number.
    pub fn advance_page(&mut self) -> i64 {
        self.bound += 1;
        self.bound
    }

    pub fn exhaust(&mut self) {
        self.exhausted = true;
    }
}

impl fmt::Display for ListingCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scope, self.bound)
    }
}

/// Formats epoch seconds as a UTC timestamp for progress logs
pub fn format_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
