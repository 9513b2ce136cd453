//! forum-archiver main entry point
//!
//! This is the command-line interface for the forum archiver.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use forum_archiver::config::{load_config_with_hash, Config, StackExchangeSite};
use forum_archiver::crawler::{CrawlJob, Orchestrator};
use forum_archiver::feed::Feeder;
use forum_archiver::sites::{Shard, StackExchangeSource};
use forum_archiver::transport::{build_http_client, HttpTransport};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// forum-archiver: incremental crawl-and-archive for discussion sites
///
/// Walks forum and Q&A listings, reassembles paginated threads and stores
/// each item as a JSON record that is only rewritten when it changed.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version)]
#[command(about = "Incremental crawl-and-archive for discussion sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Repeat passes forever
    #[arg(long)]
    patrol: bool,

    /// Write an HTML preview next to each changed record
    #[arg(long)]
    save_preview: bool,

    /// Shell command run after every pass
    #[arg(long, value_name = "SCRIPT")]
    hook_script: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl artofproblemsolving.com
    Aops(AopsArgs),

    /// Crawl a StackExchange site
    Stackexchange(StackExchangeArgs),

    /// Feed archived records to index daemons
    Feed(FeedArgs),

    /// Validate config and print the resolved crawl settings
    Check,
}

#[derive(Args, Debug)]
struct AopsArgs {
    /// Category id (e.g. 6 for High School Olympiads)
    #[arg(short, long)]
    category: i64,

    /// Start this many days before server time
    #[arg(short, long, default_value_t = 0)]
    newest: i64,

    /// Stop this many days before server time
    #[arg(short, long, default_value_t = 0)]
    oldest: i64,

    /// Archive a single topic instead of walking the category
    #[arg(short, long)]
    topic: Option<i64>,
}

#[derive(Args, Debug)]
struct StackExchangeArgs {
    /// Target site (mse, matheducators, mof, stats, physics)
    #[arg(long)]
    site: Option<StackExchangeSite>,

    /// First listing page
    #[arg(short, long = "begin-page", default_value_t = 1)]
    begin: i64,

    /// Last listing page
    #[arg(short, long = "end-page")]
    end: Option<i64>,

    /// Crawl one share of all pages, written <n>/<total>
    #[arg(short = 'c', long = "crawler", conflicts_with_all = ["begin", "end"])]
    crawler: Option<Shard>,

    /// Print the number of listing pages and exit
    #[arg(long)]
    total_pages: bool,

    /// Archive a single question (always with preview)
    #[arg(short, long)]
    post: Option<i64>,

    /// Skip questions that are already archived
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Args, Debug)]
struct FeedArgs {
    /// Archive directory or a single .json/.jsonl file
    #[arg(value_name = "CORPUS")]
    corpus: PathBuf,

    /// Index daemon URL; repeat for several daemons
    #[arg(long = "indexd-url", value_name = "URL")]
    indexd_urls: Vec<String>,

    /// Print documents instead of sending them
    #[arg(long)]
    preview: bool,

    /// Ask every daemon to terminate when done
    #[arg(long)]
    bye: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Command-line flags win over the file
    if cli.patrol {
        config.crawler.patrol = true;
    }
    if cli.save_preview {
        config.archive.save_preview = true;
    }
    if cli.hook_script.is_some() {
        config.crawler.hook_script = cli.hook_script;
    }

    match cli.command {
        Command::Aops(args) => handle_aops(config, args).await,
        Command::Stackexchange(args) => handle_stackexchange(config, args).await,
        Command::Feed(args) => handle_feed(config, args).await,
        Command::Check => {
            handle_check(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Trips the returned token on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current request...");
            trip.cancel();
        }
    });
    cancel
}

/// Runs a crawl job; an interrupt is a clean exit
async fn run_job(config: Config, transport: &HttpTransport, job: CrawlJob) -> anyhow::Result<()> {
    tracing::info!("Starting {} on {}", job, transport.root_url());
    let orchestrator = Orchestrator::from_config(config, interrupt_token())?;

    match orchestrator.run(transport, &job).await {
        Ok(()) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) if e.is_abort() => {
            tracing::info!("Crawl aborted by user");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

async fn handle_aops(config: Config, args: AopsArgs) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &config.aops.root_url)?;

    let job = match args.topic {
        Some(topic) => CrawlJob::AopsTopic {
            category: args.category,
            topic,
        },
        None => {
            if args.category <= 0 {
                bail!("category must be a positive id");
            }
            CrawlJob::AopsCategory {
                category: args.category,
                newest_days: args.newest,
                oldest_days: args.oldest,
            }
        }
    };

    run_job(config, &transport, job).await
}

async fn handle_stackexchange(mut config: Config, args: StackExchangeArgs) -> anyhow::Result<()> {
    if let Some(site) = args.site {
        config.stackexchange.site = site;
    }
    if args.no_overwrite {
        config.stackexchange.overwrite = false;
    }

    let root_url = config.stackexchange.effective_root();
    let transport = HttpTransport::from_config(&config.user_agent, &config.crawler, &root_url)?;

    if args.total_pages {
        let source = StackExchangeSource::new(&transport, &config.stackexchange);
        println!("Total pages: {}", source.total_pages().await?);
        return Ok(());
    }

    if let Some(id) = args.post {
        config.archive.save_preview = true;
        return run_job(config, &transport, CrawlJob::StackExchangePost { id }).await;
    }

    let (begin, end) = match args.crawler {
        Some(shard) => {
            let source = StackExchangeSource::new(&transport, &config.stackexchange);
            let total = source.total_pages().await?;
            let range = shard.page_range(total);
            tracing::info!(
                "Crawler {}/{} of {} pages: pages {}..={}",
                shard.index,
                shard.count,
                total,
                range.0,
                range.1
            );
            range
        }
        None => (args.begin, args.end.unwrap_or(-1)),
    };
    if end < begin {
        bail!("end page must not be before begin page (pass -e <page> or -c <n>/<total>)");
    }

    run_job(config, &transport, CrawlJob::StackExchangePages { begin, end }).await
}

async fn handle_feed(mut config: Config, args: FeedArgs) -> anyhow::Result<()> {
    if !args.indexd_urls.is_empty() {
        config.feed.indexd_urls = args.indexd_urls;
    }

    let client = build_http_client(&config.user_agent, &config.crawler)?;
    let feeder = Feeder::new(client, &config.feed)?;

    let summary = feeder.feed(&args.corpus, args.preview).await?;
    tracing::info!("{} documents fed, {} skipped", summary.sent, summary.skipped);

    if args.bye {
        feeder.bye().await;
    }
    Ok(())
}

/// Handles `check`: shows the resolved configuration
fn handle_check(config: &Config) {
    println!("=== forum-archiver configuration ===\n");

    println!("Crawler:");
    println!("  Item delay: {}ms", config.crawler.item_delay_ms);
    println!("  Continuation delay: {}ms", config.crawler.continuation_delay_ms);
    println!("  Posts per request: {}", config.crawler.posts_per_request);
    println!(
        "  Retries: {} (backoff {}ms)",
        config.crawler.max_retries, config.crawler.retry_backoff_ms
    );
    println!(
        "  Empty page retries: {} (backoff {}ms)",
        config.crawler.empty_page_retries, config.crawler.empty_page_backoff_ms
    );
    println!("  Patrol: {}", config.crawler.patrol);
    if let Some(hook) = &config.crawler.hook_script {
        println!("  Hook script: {}", hook);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nArchive:");
    println!("  Root: {}", config.archive.root.display());
    println!("  Divisions: {}", config.archive.divisions);
    println!("  Previews: {}", config.archive.save_preview);
    println!("  Error log: {}", config.archive.error_log.display());

    println!("\nAoPS:");
    println!("  Root: {}", config.aops.root_url);
    println!("  Prefix: {}", config.aops.file_prefix);
    println!(
        "  Crawl log: {}",
        config.archive.crawl_log_path(&config.aops.file_prefix).display()
    );

    println!("\nStackExchange:");
    println!("  Site: {} ({})", config.stackexchange.site, config.stackexchange.effective_root());
    println!("  Page size: {}", config.stackexchange.page_size);
    println!("  Overwrite: {}", config.stackexchange.overwrite);

    println!("\nFeed:");
    for url in &config.feed.indexd_urls {
        println!("  - {}", url);
    }
    for (field, pipeline) in &config.feed.fields {
        println!("  {} <- {}", field, pipeline.join(" | "));
    }

    println!("\n✓ Configuration is valid");
}
