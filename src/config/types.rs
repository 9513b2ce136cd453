use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for forum-archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub aops: AopsConfig,
    #[serde(default)]
    pub stackexchange: StackExchangeConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Crawler pacing and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pause between consecutive threads or posts (milliseconds)
    #[serde(rename = "item-delay-ms", default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Pause before each pagination continuation call (milliseconds)
    #[serde(rename = "continuation-delay-ms", default = "default_item_delay_ms")]
    pub continuation_delay_ms: u64,

    /// Number of posts requested per continuation call
    #[serde(rename = "posts-per-request", default = "default_posts_per_request")]
    pub posts_per_request: u32,

    /// Transport retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base transport backoff; attempt `n` waits `n` times this (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Retries for a listing page that comes back empty
    #[serde(rename = "empty-page-retries", default = "default_empty_page_retries")]
    pub empty_page_retries: u32,

    /// Base backoff for empty listing pages (milliseconds)
    #[serde(rename = "empty-page-backoff-ms", default = "default_backoff_ms")]
    pub empty_page_backoff_ms: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Repeat the crawl pass forever
    #[serde(default)]
    pub patrol: bool,

    /// Pause between patrol passes, after the hook ran (milliseconds)
    #[serde(rename = "patrol-interval-ms", default)]
    pub patrol_interval_ms: u64,

    /// Shell command run after every pass
    #[serde(rename = "hook-script", default)]
    pub hook_script: Option<String>,
}

impl CrawlerConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn continuation_delay(&self) -> Duration {
        Duration::from_millis(self.continuation_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn empty_page_backoff(&self) -> Duration {
        Duration::from_millis(self.empty_page_backoff_ms)
    }

    pub fn patrol_interval(&self) -> Duration {
        Duration::from_millis(self.patrol_interval_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: default_item_delay_ms(),
            continuation_delay_ms: default_item_delay_ms(),
            posts_per_request: default_posts_per_request(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_backoff_ms(),
            empty_page_retries: default_empty_page_retries(),
            empty_page_backoff_ms: default_backoff_ms(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            patrol: false,
            patrol_interval_ms: 0,
            hook_script: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Archive layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,

    /// Number of shard directories
    #[serde(default = "default_divisions")]
    pub divisions: u64,

    #[serde(rename = "save-preview", default)]
    pub save_preview: bool,

    /// HTML template with `{PREVIEW}` and `{URL}`; built-in when absent
    #[serde(rename = "preview-template", default)]
    pub preview_template: Option<PathBuf>,

    #[serde(rename = "error-log", default = "default_error_log")]
    pub error_log: PathBuf,

    /// Directory holding the per-site crawl logs
    #[serde(rename = "log-dir", default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl ArchiveConfig {
    /// Crawl log path for a site prefix: `<log-dir>/<prefix>.log`
    pub fn crawl_log_path(&self, prefix: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", prefix))
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
            divisions: default_divisions(),
            save_preview: false,
            preview_template: None,
            error_log: default_error_log(),
            log_dir: default_log_dir(),
        }
    }
}

/// AoPS forum settings
#[derive(Debug, Clone, Deserialize)]
pub struct AopsConfig {
    #[serde(rename = "root-url", default = "default_aops_root")]
    pub root_url: String,

    #[serde(rename = "file-prefix", default = "default_aops_prefix")]
    pub file_prefix: String,

    /// Token identifying the bootstrap script block
    #[serde(rename = "bootstrap-marker", default = "default_bootstrap_marker")]
    pub bootstrap_marker: String,
}

impl Default for AopsConfig {
    fn default() -> Self {
        Self {
            root_url: default_aops_root(),
            file_prefix: default_aops_prefix(),
            bootstrap_marker: default_bootstrap_marker(),
        }
    }
}

/// Supported StackExchange sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackExchangeSite {
    Mse,
    Matheducators,
    Mof,
    Stats,
    Physics,
}

impl StackExchangeSite {
    pub const ALL: [StackExchangeSite; 5] = [
        Self::Mse,
        Self::Matheducators,
        Self::Mof,
        Self::Stats,
        Self::Physics,
    ];

    /// Short name, also used as the record file prefix
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Matheducators => "matheducators",
            Self::Mof => "mof",
            Self::Stats => "stats",
            Self::Physics => "physics",
        }
    }

    pub fn root_url(&self) -> &'static str {
        match self {
            Self::Mse => "https://math.stackexchange.com",
            Self::Matheducators => "https://matheducators.stackexchange.com",
            Self::Mof => "https://mathoverflow.net",
            Self::Stats => "https://stats.stackexchange.com",
            Self::Physics => "https://physics.stackexchange.com",
        }
    }
}

impl fmt::Display for StackExchangeSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StackExchangeSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|site| site.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown site '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// StackExchange Q&A settings
#[derive(Debug, Clone, Deserialize)]
pub struct StackExchangeConfig {
    #[serde(default = "default_site")]
    pub site: StackExchangeSite,

    /// Overrides the site's well-known root URL
    #[serde(rename = "root-url", default)]
    pub root_url: Option<String>,

    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Re-fetch questions that already have a record
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl StackExchangeConfig {
    /// The effective site root, without a trailing slash
    pub fn effective_root(&self) -> String {
        self.root_url
            .as_deref()
            .unwrap_or(self.site.root_url())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for StackExchangeConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            root_url: None,
            page_size: default_page_size(),
            overwrite: true,
        }
    }
}

/// Index feeder settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(rename = "indexd-urls", default = "default_indexd_urls")]
    pub indexd_urls: Vec<String>,

    #[serde(rename = "allow-extensions", default = "default_allow_extensions")]
    pub allow_extensions: Vec<String>,

    /// Stop after this many documents; 0 means unlimited
    #[serde(rename = "max-items", default)]
    pub max_items: u64,

    /// Outgoing field → `[source-key, transform...]`
    #[serde(default = "default_fields")]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            indexd_urls: default_indexd_urls(),
            allow_extensions: default_allow_extensions(),
            max_items: 0,
            fields: default_fields(),
        }
    }
}

fn default_item_delay_ms() -> u64 {
    600
}

fn default_posts_per_request() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    10_000
}

fn default_empty_page_retries() -> u32 {
    60
}

fn default_connect_timeout() -> u64 {
    8
}

fn default_request_timeout() -> u64 {
    10
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_divisions() -> u64 {
    500
}

fn default_error_log() -> PathBuf {
    PathBuf::from("error.log")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_aops_root() -> String {
    "https://artofproblemsolving.com".to_string()
}

fn default_aops_prefix() -> String {
    "aops".to_string()
}

fn default_bootstrap_marker() -> String {
    "AoPS.bootstrap_data".to_string()
}

fn default_site() -> StackExchangeSite {
    StackExchangeSite::Mse
}

fn default_page_size() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_indexd_urls() -> Vec<String> {
    vec!["http://localhost:8934/index".to_string()]
}

fn default_allow_extensions() -> Vec<String> {
    vec!["json".to_string(), "jsonl".to_string()]
}

fn default_fields() -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();
    fields.insert("url".to_string(), vec!["url".to_string()]);
    fields.insert(
        "content".to_string(),
        vec!["text".to_string(), "replace_dollars".to_string()],
    );
    fields.insert(
        "site".to_string(),
        vec!["url".to_string(), "url2site".to_string()],
    );
    fields
}
