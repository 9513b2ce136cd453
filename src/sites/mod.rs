//! Site adapters
//!
//! Each adapter speaks one site's protocol over a [`Transport`] and feeds
//! the generic crawl machinery:
//!
//! - `aops`: bootstrap-script pages plus a session-bound JSON API
//!   ([`ThreadSource`] and [`TopicIndex`])
//! - `stackexchange`: server-rendered question listings ([`PageIndex`])
//!
//! [`Transport`]: crate::transport::Transport
//! [`ThreadSource`]: crate::crawler::ThreadSource
//! [`TopicIndex`]: crate::crawler::TopicIndex
//! [`PageIndex`]: crate::crawler::PageIndex

pub mod aops;
pub mod stackexchange;

pub use aops::AopsSource;
pub use stackexchange::{question_path, Question, Shard, StackExchangeSource};
