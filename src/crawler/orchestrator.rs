//! Crawl orchestration
//!
//! Drives a listing walker, feeds each item through thread assembly or a
//! single-page fetch, and hands the result to the archive writer. A pass
//! walks the listing once; patrol mode repeats passes until interrupted,
//! running the post-cycle hook after each one.

use crate::archive::{ArchiveRecord, ArchiveWriter, CrawlLog, ErrorLog, PreviewTemplate, WriteOutcome};
use crate::config::{ArchiveConfig, Config};
use crate::crawler::listing::{PageWalker, TimeWindowWalker};
use crate::crawler::pacer::{Pacer, Sleeper, TokioSleeper};
use crate::crawler::pagination::{PaginationEngine, ThreadRef, ThreadReport};
use crate::sites::{question_path, AopsSource, StackExchangeSource};
use crate::text::TexNormalizer;
use crate::transport::Transport;
use crate::{ArchiveError, Result};
use std::fmt;
use std::future::Future;
use std::ops::AddAssign;
use tokio_util::sync::CancellationToken;

/// What one invocation crawls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlJob {
    /// AoPS category, walked back from `newest_days` to `oldest_days` ago
    AopsCategory {
        category: i64,
        newest_days: i64,
        oldest_days: i64,
    },
    AopsTopic { category: i64, topic: i64 },
    /// StackExchange listing pages `begin..=end`
    StackExchangePages { begin: i64, end: i64 },
    StackExchangePost { id: i64 },
}

impl CrawlJob {
    /// Single-item jobs run once, without patrol or hook
    pub fn is_single_item(&self) -> bool {
        matches!(self, Self::AopsTopic { .. } | Self::StackExchangePost { .. })
    }
}

impl fmt::Display for CrawlJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AopsCategory {
                category,
                newest_days,
                oldest_days,
            } => write!(f, "category {} ({}..{} days ago)", category, newest_days, oldest_days),
            Self::AopsTopic { category, topic } => write!(f, "topic c{}h{}", category, topic),
            Self::StackExchangePages { begin, end } => write!(f, "pages {}..={}", begin, end),
            Self::StackExchangePost { id } => write!(f, "post {}", id),
        }
    }
}

/// Runs after every completed pass
pub trait PostCycleHook: Send + Sync {
    fn after_pass(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Runs a shell command after each pass, if one is configured
#[derive(Debug, Clone, Default)]
pub struct ShellHook {
    script: Option<String>,
}

impl ShellHook {
    pub fn new(script: Option<String>) -> Self {
        Self {
            script: script.filter(|s| !s.trim().is_empty()),
        }
    }
}

impl PostCycleHook for ShellHook {
    async fn after_pass(&self) -> Result<()> {
        let Some(script) = &self.script else {
            return Ok(());
        };
        tracing::info!("Running hook script: {}", script);
        // killed if the pass is interrupted while it runs
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(script)
            .kill_on_drop(true)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(ArchiveError::Hook(format!("`{}` exited with {}", script, status)))
        }
    }
}

/// Counters of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AddAssign for PassSummary {
    fn add_assign(&mut self, other: Self) {
        self.archived += other.archived;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archived, {} skipped, {} failed",
            self.archived, self.skipped, self.failed
        )
    }
}

/// Builds the archive writer, loading the preview template when previews are on
pub fn build_writer(archive: &ArchiveConfig) -> Result<ArchiveWriter> {
    let writer = ArchiveWriter::new(&archive.root, archive.divisions);
    if !archive.save_preview {
        return Ok(writer);
    }
    let template = match &archive.preview_template {
        Some(path) => PreviewTemplate::load(path)?,
        None => PreviewTemplate::default(),
    };
    Ok(writer.with_preview(template))
}

/// Main crawl driver
pub struct Orchestrator<S, H> {
    config: Config,
    pacer: Pacer<S>,
    writer: ArchiveWriter,
    errors: ErrorLog,
    hook: H,
    aops_tex: TexNormalizer,
    plain_tex: TexNormalizer,
}

impl Orchestrator<TokioSleeper, ShellHook> {
    /// Creates an orchestrator sleeping in real time
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `cancel` - Token tripped on interrupt
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run jobs
    /// * `Err(ArchiveError)` - The preview template could not be loaded
    pub fn from_config(config: Config, cancel: CancellationToken) -> Result<Self> {
        let writer = build_writer(&config.archive)?;
        let hook = ShellHook::new(config.crawler.hook_script.clone());
        Ok(Self::new(config, Pacer::new(TokioSleeper, cancel), writer, hook))
    }
}

impl<S: Sleeper, H: PostCycleHook> Orchestrator<S, H> {
    pub fn new(config: Config, pacer: Pacer<S>, writer: ArchiveWriter, hook: H) -> Self {
        let errors = ErrorLog::new(config.archive.error_log.clone());
        Self {
            config,
            pacer,
            writer,
            errors,
            hook,
            aops_tex: TexNormalizer::new(true),
            plain_tex: TexNormalizer::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs a job to completion
    ///
    /// Listing jobs run one pass, or repeat passes forever in patrol mode.
    /// `UserAbort` stops everything. Any other error ending a pass is
    /// logged; patrol then carries on with the next pass.
    pub async fn run<T: Transport>(&self, transport: &T, job: &CrawlJob) -> Result<()> {
        if job.is_single_item() {
            let summary = self.run_pass(transport, job).await?;
            tracing::info!("Finished {}: {}", job, summary);
            return Ok(());
        }

        let mut passes = 0u64;
        loop {
            passes += 1;
            tracing::info!("Pass {} over {}", passes, job);
            match self.run_pass(transport, job).await {
                Ok(summary) => tracing::info!("Pass {} finished: {}", passes, summary),
                Err(e) if e.is_abort() => {
                    tracing::info!("[abort]");
                    return Err(e);
                }
                Err(e) => {
                    self.errors.record(&format!("{} ({})", job, e));
                    if !self.config.crawler.patrol {
                        return Err(e);
                    }
                }
            }

            if let Err(e) = self.pacer.guard(self.hook.after_pass()).await {
                if e.is_abort() {
                    return Err(e);
                }
                self.errors.record(&e.to_string());
            }

            if !self.config.crawler.patrol {
                return Ok(());
            }
            self.pacer.pause(self.config.crawler.patrol_interval()).await?;
        }
    }

    async fn run_pass<T: Transport>(&self, transport: &T, job: &CrawlJob) -> Result<PassSummary> {
        match *job {
            CrawlJob::AopsCategory {
                category,
                newest_days,
                oldest_days,
            } => {
                let site = AopsSource::new(transport, &self.config.aops);
                self.aops_pass(&site, category, newest_days, oldest_days).await
            }
            CrawlJob::AopsTopic { category, topic } => {
                let site = AopsSource::new(transport, &self.config.aops);
                let thread = ThreadRef {
                    category_id: category,
                    thread_id: topic,
                };
                let report = self.archive_topic(&site, thread).await?;
                tracing::info!("topic {}: {}", topic, report.status);
                Ok(PassSummary {
                    archived: 1,
                    ..PassSummary::default()
                })
            }
            CrawlJob::StackExchangePages { begin, end } => {
                let site = StackExchangeSource::new(transport, &self.config.stackexchange);
                let mut summary = self.stackexchange_pass(&site, "newest", begin, end).await?;
                if self.config.crawler.patrol {
                    summary += self.stackexchange_pass(&site, "active", begin, end).await?;
                }
                Ok(summary)
            }
            CrawlJob::StackExchangePost { id } => {
                let site = StackExchangeSource::new(transport, &self.config.stackexchange);
                let outcome = self.archive_question(&site, id, &question_path(id), false).await?;
                tracing::info!("post {}: {}", id, outcome);
                Ok(PassSummary {
                    archived: 1,
                    ..PassSummary::default()
                })
            }
        }
    }

    /// Logs a per-item error and lets the walk go on; fatal errors propagate
    fn swallow(&self, error: ArchiveError, context: &str, summary: &mut PassSummary) -> Result<()> {
        if error.is_fatal() {
            return Err(error);
        }
        summary.failed += 1;
        self.errors.record(&format!("{} ({})", context, error));
        Ok(())
    }

    async fn aops_pass<T: Transport>(
        &self,
        site: &AopsSource<T>,
        category: i64,
        newest_days: i64,
        oldest_days: i64,
    ) -> Result<PassSummary> {
        let crawl_log = CrawlLog::new(self.config.archive.crawl_log_path(&self.config.aops.file_prefix));
        let mut walker = TimeWindowWalker::new(site, &self.pacer, category, newest_days, oldest_days);
        let mut summary = PassSummary::default();

        while let Some(item) = walker.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    self.swallow(e, &format!("category {}", category), &mut summary)?;
                    continue;
                }
            };

            let thread = ThreadRef {
                category_id: category,
                thread_id: item.id,
            };
            match self.archive_topic(site, thread).await {
                Ok(_) => {
                    summary.archived += 1;
                    crawl_log.record(&format!("category {}, topic_id: {}", category, item.id))?;
                    self.pacer.pause(self.config.crawler.item_delay()).await?;
                }
                Err(e) => {
                    self.swallow(e, &format!("topic {}", item.path), &mut summary)?;
                    self.pacer.pause(self.config.crawler.item_delay()).await?;
                }
            }
        }

        Ok(summary)
    }

    async fn archive_topic<T: Transport>(
        &self,
        site: &AopsSource<T>,
        thread: ThreadRef,
    ) -> Result<ThreadReport> {
        let engine = PaginationEngine::new(
            site,
            &self.pacer,
            self.config.crawler.continuation_delay(),
            self.config.crawler.posts_per_request,
        );
        engine
            .assemble(thread, |chunk| {
                let key = site.record_key(chunk);
                let record = ArchiveRecord::new(site.record_url(chunk), self.aops_tex.normalize(&chunk.text));
                let outcome = self.writer.write(&key, &record)?;
                tracing::info!("[{}] {}", outcome, key);
                Ok(outcome)
            })
            .await
    }

    async fn stackexchange_pass<T: Transport>(
        &self,
        site: &StackExchangeSource<T>,
        sort: &str,
        begin: i64,
        end: i64,
    ) -> Result<PassSummary> {
        let crawl = &self.config.crawler;
        let crawl_log = CrawlLog::new(self.config.archive.crawl_log_path(site.file_prefix()));
        let mut walker = PageWalker::new(
            site,
            &self.pacer,
            sort,
            begin,
            end,
            crawl.empty_page_retries,
            crawl.empty_page_backoff(),
        );
        let mut summary = PassSummary::default();
        let skip_existing = !self.config.stackexchange.overwrite;

        while let Some(item) = walker.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    self.swallow(e, &format!("{} listing", sort), &mut summary)?;
                    continue;
                }
            };

            match self.archive_question(site, item.id, &item.path, skip_existing).await {
                Ok(outcome) => {
                    crawl_log.record(&format!("page {}, post_id: {}", item.scope, item.id))?;
                    if outcome == WriteOutcome::Skipped {
                        summary.skipped += 1;
                    } else {
                        summary.archived += 1;
                        self.pacer.pause(crawl.item_delay()).await?;
                    }
                }
                Err(e) => {
                    self.swallow(e, &format!("post {}", site.record_url(&item.path)), &mut summary)?;
                    self.pacer.pause(crawl.item_delay()).await?;
                }
            }
        }

        Ok(summary)
    }

    async fn archive_question<T: Transport>(
        &self,
        site: &StackExchangeSource<T>,
        id: i64,
        path: &str,
        skip_existing: bool,
    ) -> Result<WriteOutcome> {
        let key = site.record_key(id);
        if skip_existing && self.writer.exists(&key) {
            tracing::info!("[exists, skip] {}", self.writer.record_path(&key).display());
            return Ok(WriteOutcome::Skipped);
        }

        let question = self.pacer.guard(site.fetch_question(path)).await?;
        let record = ArchiveRecord::new(site.record_url(path), self.plain_tex.normalize(&question.text))
            .with_tags(question.tags);
        let outcome = self.writer.write(&key, &record)?;
        tracing::info!("[{}] {}", outcome, key);
        Ok(outcome)
    }
}
