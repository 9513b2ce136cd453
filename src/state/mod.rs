//! State module for tracking crawl progress
//!
//! This module provides the state the crawler mutates while it walks
//! listings and assembles threads.
//!
//! # Components
//!
//! - `ThreadFetchState`: accumulated posts of one thread being paginated
//! - `ListingCursor`: monotonic position of a listing walk
//! - `Session`: anonymous credentials authorizing continuation calls

mod cursor;
mod thread_state;

// Re-export main types
pub use cursor::{format_epoch, ListingCursor};
pub use thread_state::{Inclusion, Post, Session, ThreadFetchState, ThreadStatus};
