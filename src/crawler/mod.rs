//! Crawler module for listing walks and thread assembly
//!
//! This module contains the site-independent crawl machinery:
//! - Politeness delays and cancellation (`pacer`)
//! - Time-windowed and page-indexed listing walkers (`listing`)
//! - Reassembly of paginated threads (`pagination`)
//! - Pass and patrol orchestration (`orchestrator`)
//!
//! Site adapters in [`crate::sites`] plug into the traits defined here.

mod listing;
mod orchestrator;
mod pacer;
mod pagination;

pub use listing::{
    ListingItem, PageEntry, PageIndex, PageWalker, TimeWindowWalker, TopicEntry, TopicIndex, TopicPage,
};
pub use orchestrator::{build_writer, CrawlJob, Orchestrator, PassSummary, PostCycleHook, ShellHook};
pub use pacer::{Pacer, Sleeper, TokioSleeper};
pub use pagination::{
    Chunk, ContinuationRequest, PaginationEngine, ThreadOpening, ThreadRef, ThreadReport, ThreadSource,
};
