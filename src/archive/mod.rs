//! Archive module for persisting crawled items
//!
//! # Components
//!
//! - `ArchiveWriter`: byte-compare-then-replace record persistence with
//!   sharded placement
//! - `PreviewTemplate`: optional human-readable `.html` sibling of a record
//! - `CrawlLog` / `ErrorLog`: append-only text logs

mod log;
mod preview;
mod writer;

pub use log::{CrawlLog, ErrorLog};
pub use preview::PreviewTemplate;
pub use writer::{ArchiveRecord, ArchiveWriter, RecordKey, WriteOutcome};
