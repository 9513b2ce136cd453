//! Index feeder
//!
//! Replays archived records into one or more index daemons. Each record is
//! reshaped by the `[feed.fields]` pipelines and POSTed as JSON to every
//! configured daemon in turn.
//!
//! # Components
//!
//! - `corpus`: file discovery and lazy document reading
//! - `transform`: field pipelines

mod corpus;
mod transform;

pub use corpus::{corpus_files, CorpusDoc, CorpusReader};
pub use transform::{compile_fields, FieldSpec, Transform};

use crate::config::FeedConfig;
use crate::{ArchiveError, Result};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::path::Path;

const PROGRESS_EVERY: u64 = 1000;

/// Counters of one feed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub sent: u64,
    pub skipped: u64,
}

/// Sends corpus documents to index daemons
pub struct Feeder {
    client: Client,
    indexd_urls: Vec<String>,
    allow_extensions: Vec<String>,
    max_items: u64,
    fields: Vec<(String, FieldSpec)>,
}

impl Feeder {
    /// Creates a feeder from the `[feed]` section
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for every daemon
    /// * `config` - Feed configuration with daemon URLs and field pipelines
    ///
    /// # Returns
    ///
    /// * `Ok(Feeder)` - Ready to feed
    /// * `Err(ArchiveError::Feed)` - No daemon configured or a bad pipeline
    pub fn new(client: Client, config: &FeedConfig) -> Result<Self> {
        if config.indexd_urls.is_empty() {
            return Err(ArchiveError::Feed("no index daemon URL configured".into()));
        }
        let fields = compile_fields(&config.fields).map_err(ArchiveError::Feed)?;
        Ok(Self {
            client,
            indexd_urls: config.indexd_urls.clone(),
            allow_extensions: config.allow_extensions.clone(),
            max_items: config.max_items,
            fields,
        })
    }

    /// Builds the outgoing document for one archived record
    pub fn build_document(&self, record: &Value) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.evaluate(record)))
            .collect();
        Value::Object(map)
    }

    /// Feeds every document under `corpus`
    ///
    /// With `preview` set, documents are printed instead of sent. An
    /// unreachable daemon aborts the feed; unparsable documents are skipped.
    pub async fn feed(&self, corpus: &Path, preview: bool) -> Result<FeedSummary> {
        let mut summary = FeedSummary::default();

        for doc in CorpusReader::open(corpus, &self.allow_extensions, self.max_items)? {
            let doc = doc?;
            let record: Value = match serde_json::from_str(&doc.raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", doc.source_id, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            let outgoing = self.build_document(&record);

            if preview {
                println!("src_id: {}", doc.source_id);
                println!("preview: {}\n", outgoing);
                summary.sent += 1;
                continue;
            }

            let response = self.send_to_each(&outgoing).await?;
            summary.sent += 1;
            if summary.sent % PROGRESS_EVERY == 0 {
                let docid = response.get("docid").cloned().unwrap_or_default();
                tracing::info!("Indexed {} documents, last docid: {}", summary.sent, docid);
            }
        }

        tracing::info!(
            "Feed finished: {} sent, {} skipped",
            summary.sent,
            summary.skipped
        );
        Ok(summary)
    }

    /// Asks every daemon to terminate, ignoring failures
    pub async fn bye(&self) {
        let bye = json!({"cmd": "BYE"});
        for url in &self.indexd_urls {
            match self.send_json(url, &bye).await {
                Ok(_) => tracing::info!("Sent BYE to {}", url),
                Err(e) => tracing::warn!("BYE to {} failed: {}", url, e),
            }
        }
    }

    /// Returns the last daemon's response
    async fn send_to_each(&self, document: &Value) -> Result<Value> {
        let mut last = Value::Null;
        for url in &self.indexd_urls {
            last = self
                .send_json(url, document)
                .await
                .map_err(|e| ArchiveError::Feed(format!("{}: {}", url, e)))?;
        }
        Ok(last)
    }

    async fn send_json(&self, url: &str, document: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(document)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}
