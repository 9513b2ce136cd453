//! StackExchange question sites
//!
//! Listings are server-rendered HTML pages, so everything here is CSS
//! selection. Both the legacy `question-summary` markup and the newer
//! `s-post-summary` markup are recognized.

use crate::archive::RecordKey;
use crate::config::StackExchangeConfig;
use crate::crawler::{PageEntry, PageIndex};
use crate::text::{comment_text, element_text, paragraph_text};
use crate::transport::{Transport, TransportRequest};
use crate::{ArchiveError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use std::sync::LazyLock;

static SUMMARY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"question-summary-(\d+)").expect("hardcoded regex pattern is valid"));

/// A question page reduced to archive text and tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub tags: Vec<String>,
}

/// StackExchange adapter over a transport bound to the site root
pub struct StackExchangeSource<T> {
    transport: T,
    root_url: String,
    file_prefix: String,
    page_size: u32,
}

impl<T: Transport> StackExchangeSource<T> {
    pub fn new(transport: T, config: &StackExchangeConfig) -> Self {
        Self {
            transport,
            root_url: config.effective_root(),
            file_prefix: config.site.name().to_string(),
            page_size: config.page_size,
        }
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Record key of a question: `<prefix><id>`, sharded by id
    pub fn record_key(&self, id: i64) -> RecordKey {
        RecordKey::new(id, format!("{}{}", self.file_prefix, id))
    }

    /// Public URL of a question page
    pub fn record_url(&self, path: &str) -> String {
        format!("{}{}", self.root_url, noredirect_path(path))
    }

    /// Fetches a question with its answers and comments
    pub async fn fetch_question(&self, path: &str) -> Result<Question> {
        let page = noredirect_path(path);
        let body = self.transport.fetch(&TransportRequest::get(page.as_str())).await?;
        parse_question(&body, &page)
    }

    /// Number of listing pages, read from the pager of the newest tab
    pub async fn total_pages(&self) -> Result<i64> {
        let path = "/questions?tab=newest";
        let body = self.transport.fetch(&TransportRequest::get(path)).await?;
        parse_total_pages(&body)
            .ok_or_else(|| ArchiveError::protocol(path, "no page count in pager"))
    }
}

impl<T: Transport> PageIndex for StackExchangeSource<T> {
    async fn fetch_page(&self, sort: &str, page: i64) -> Result<Vec<PageEntry>> {
        let path = format!(
            "/questions?pagesize={}&sort={}&page={}",
            self.page_size, sort, page
        );
        let body = self.transport.fetch(&TransportRequest::get(path)).await?;
        Ok(parse_listing(&body))
    }
}

/// Path of a question addressed only by id
pub fn question_path(id: i64) -> String {
    format!("/questions/{}", id)
}

fn noredirect_path(path: &str) -> String {
    format!("{}?noredirect=1", path)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ArchiveError::protocol(css, format!("bad selector: {:?}", e)))
}

/// Extracts question links from a listing page
pub fn parse_listing(body: &str) -> Vec<PageEntry> {
    let document = Html::parse_document(body);
    let (Ok(summaries), Ok(links)) = (
        selector("div.question-summary, div.s-post-summary"),
        selector("a.question-hyperlink, a.s-link"),
    ) else {
        return Vec::new();
    };

    document
        .select(&summaries)
        .map(|summary| {
            let id = summary
                .value()
                .attr("id")
                .or_else(|| summary.value().attr("data-post-id"))
                .and_then(|raw| {
                    SUMMARY_ID
                        .captures(raw)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str())
                        .or(Some(raw))
                })
                .and_then(|digits| digits.parse::<i64>().ok());
            let path = summary
                .select(&links)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);
            PageEntry { id, path }
        })
        .collect()
}

/// Builds archive text: title, question, then every answer
///
/// Each body contributes its paragraphs and its comments, each block
/// followed by an empty line.
pub fn parse_question(body: &str, context: &str) -> Result<Question> {
    let document = Html::parse_document(body);

    let title = document
        .select(&selector("#question-header h1")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ArchiveError::field_missing("question-header", context))?;
    let question = document
        .select(&selector("#question")?)
        .next()
        .ok_or_else(|| ArchiveError::field_missing("question", context))?;
    let answers = document
        .select(&selector("#answers")?)
        .next()
        .ok_or_else(|| ArchiveError::field_missing("answers", context))?;

    let mut text = format!("{}\n\n", title);
    push_body(&mut text, question);

    let tags = question
        .select(&selector("a.post-tag")?)
        .map(element_text)
        .collect();

    for answer in answers.select(&selector("div.answer")?) {
        push_body(&mut text, answer);
    }

    Ok(Question { text, tags })
}

fn push_body(text: &mut String, element: ElementRef<'_>) {
    text.push_str(&paragraph_text(element));
    text.push('\n');
    text.push_str(&comment_text(element));
    text.push('\n');
}

fn parse_total_pages(body: &str) -> Option<i64> {
    let document = Html::parse_document(body);
    let pager = selector("div.pager a, div.s-pagination a").ok()?;
    let labels: Vec<String> = document.select(&pager).map(element_text).collect();
    // the last link is "next"
    labels.iter().rev().nth(1)?.parse().ok()
}

/// One crawler out of a group splitting the page range, written `n/total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub index: i64,
    pub count: i64,
}

impl Shard {
    /// Page range of this shard: `ceil(total_pages / count)` pages each
    pub fn page_range(&self, total_pages: i64) -> (i64, i64) {
        let per_shard = (total_pages + self.count - 1) / self.count;
        (1 + (self.index - 1) * per_shard, self.index * per_shard)
    }
}

impl FromStr for Shard {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (index, count) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <n>/<total>, got '{}'", s))?;
        let index: i64 = index.trim().parse().map_err(|_| format!("bad crawler number '{}'", index))?;
        let count: i64 = count.trim().parse().map_err(|_| format!("bad crawler total '{}'", count))?;
        if count < 1 || index < 1 || index > count {
            return Err(format!("crawler number must be in 1..={}", count.max(1)));
        }
        Ok(Self { index, count })
    }
}
