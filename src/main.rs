//! # News Harvest
//!
//! Collection tools for a news aggregator: story and event IDs, the source
//! lists behind each story, and the full text of every source article from
//! the publishers' own sites.
//!
//! ## Usage
//!
//! ```sh
//! news_harvest story-ids --events <interest-id>... --output-dir ids
//! news_harvest sources --file ids/story_ids_<interest-id>.json --output-dir news_sources
//! news_harvest aggregate --input-dir news_sources --output stories.json
//! news_harvest download --input stories.json --output-dir data/downloads
//! ```
//!
//! ## Architecture
//!
//! Every subcommand is one step that reads and writes JSON (or CSV) files:
//! 1. **Discovery**: interest and topic pages yield story and event IDs
//! 2. **Sources**: the aggregator API maps each story or event to its articles
//! 3. **Full text**: a worker pool fetches every article over HTTP, falling
//!    back to a headless browser, and stores the extracted text

use clap::Parser;
use std::error::Error;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod browser;
mod cli;
mod config;
mod error;
mod fulltext;
mod models;
mod outputs;
mod retry;
mod scrapers;
mod utils;

use api::AggregatorApi;
use browser::{ChromeSession, PageRenderer};
use cli::{Cli, Command};
use config::{Settings, load_settings};
use fulltext::DownloadJob;
use scrapers::event_sources::EventSourcesJob;
use scrapers::story_ids::StoryIdsJob;
use scrapers::topic_stories::TopicStoriesJob;

/// Exit code for a run cut short by a second Ctrl-C.
const FORCED_EXIT_CODE: i32 = 130;

/// Run `force` once `second` resolves, without waiting for workers.
fn on_second_signal<S, F>(second: S, force: F) -> tokio::task::JoinHandle<()>
where
    S: Future<Output = ()> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        second.await;
        warn!("Second stop request; exiting immediately");
        force();
    })
}

async fn ctrl_c_or_never() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Resolves on the first Ctrl-C. A second one exits the process at once.
async fn shutdown_signal() {
    ctrl_c_or_never().await;
    info!("Stop requested; finishing tasks in progress (Ctrl-C again to quit now)");
    on_second_signal(ctrl_c_or_never(), || {
        std::process::exit(FORCED_EXIT_CODE);
    });
}

#[instrument(skip_all)]
async fn run(command: Command, mut settings: Settings) -> Result<(), Box<dyn Error>> {
    match command {
        Command::StoryIds(args) => {
            let api = AggregatorApi::new(&settings)?;
            let job = StoryIdsJob {
                interests: args.events,
                n: args.n,
                offset: args.offset,
                concurrency: args.concurrency,
                output_dir: PathBuf::from(args.output_dir),
            };
            let total = scrapers::story_ids::run(&api, &job).await?;
            info!(interests = job.interests.len(), total, "Story IDs saved");
        }
        Command::Sources(args) => {
            let api = AggregatorApi::new(&settings)?;
            let report = scrapers::news_sources::run(
                &api,
                Path::new(&args.file),
                Path::new(&args.output_dir),
                args.concurrency,
            )
            .await?;
            info!(
                saved = report.saved,
                existing = report.existing,
                failed = report.failed,
                "Story sources done"
            );
        }
        Command::Aggregate(args) => {
            scrapers::aggregate::run(Path::new(&args.input_dir), Path::new(&args.output)).await?;
        }
        Command::TopicEvents(args) => {
            let api = AggregatorApi::new(&settings)?;
            scrapers::topic_events::run(
                &api,
                &args.interest,
                args.start_offset..args.end_offset,
                Duration::from_millis(args.delay_ms),
                Path::new(&args.output),
            )
            .await?;
        }
        Command::EventSources(args) => {
            let api = AggregatorApi::new(&settings)?;
            let job = EventSourcesJob {
                max_attempts: args.max_attempts,
                retry_delay: Duration::from_millis(args.retry_delay_ms),
            };
            scrapers::event_sources::run(
                &api,
                Path::new(&args.input),
                Path::new(&args.output),
                &job,
            )
            .await?;
        }
        Command::TopicStories(args) => {
            let api = AggregatorApi::new(&settings)?;
            settings.browser.headless |= args.headless;
            let mut session = ChromeSession::new(settings.browser.clone(), settings.user_agent.clone());
            let job = TopicStoriesJob {
                href: args.href,
                tag: args.tag,
                relevant_only: args.relevant_only,
                concurrency: args.concurrency,
                wait: Duration::from_secs(args.wait_secs),
                output_dir: PathBuf::from(args.output_dir),
            };

            let result = scrapers::topic_stories::run(&api, &mut session, &job).await;
            if let Err(e) = session.shutdown().await {
                warn!(error = %e, "Browser did not shut down cleanly");
            }
            debug!(launches = session.launches(), "Browser session closed");
            result?;
        }
        Command::UrlMap(args) => {
            fulltext::url_mapping::run(
                Path::new(&args.json_dir),
                Path::new(&args.csv_file),
                args.limit,
            )
            .await?;
        }
        Command::Download(args) => {
            settings.browser.headless |= args.headless;
            let job = DownloadJob {
                input: PathBuf::from(args.input),
                output_dir: PathBuf::from(args.output_dir),
                workers: args.workers,
                max_domain_failures: args.max_domain_failures,
                use_browser: !args.no_browser,
            };
            let report = fulltext::download(&settings, &job, shutdown_signal()).await?;
            info!(
                processed = report.processed(),
                saved = report.saved(),
                "Downloads finished"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    let cli = Cli::parse();
    debug!(command = ?cli.command, "Parsed CLI arguments");

    let settings = load_settings(cli.config.as_deref())?.apply_cli(&cli);
    debug!(api_base = %settings.api_base, site_base = %settings.site_base, "Resolved settings");

    if let Err(e) = run(cli.command, settings).await {
        error!(error = %e, "Run failed");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
