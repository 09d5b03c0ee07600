//! Full-text collection from publisher sites.
//!
//! # Submodules
//!
//! - [`url_mapping`]: gather source URLs from story collections into a CSV
//! - [`tasks`]: build the download task list, leaving out finished tasks
//! - [`fetch`]: plain HTTP page and PDF fetching with retries
//! - [`extract`]: article metadata and main text from HTML
//! - [`domains`]: per-domain failure counts
//! - [`pool`]: the worker pool that ties them together
//!
//! # Fetch Strategy
//!
//! | Step | Strategy | Used when |
//! |------|----------|-----------|
//! | 1 | PDF download | link path ends in `.pdf` |
//! | 2 | HTTP fetch + extraction | always tried first for HTML pages |
//! | 3 | Browser render + extraction | HTTP failed or produced no article text |

pub mod domains;
pub mod extract;
pub mod fetch;
pub mod pool;
pub mod tasks;
pub mod url_mapping;

use crate::browser::{ChromeSession, NoBrowser};
use crate::config::Settings;
use crate::error::Result;
use crate::utils::ensure_writable_dir;
use domains::{DomainFailures, STATE_FILE};
use fetch::PageFetcher;
use pool::{DownloadContext, DownloadReport, PoolOptions, run_pool};
use std::future::Future;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub max_domain_failures: u32,
    pub use_browser: bool,
}

/// Download every pending task listed in `job.input`, stopping early when
/// `shutdown` resolves.
///
/// Domain failure counts are loaded from and saved back to
/// `_domain_failures.json` in the output directory.
///
/// # Arguments
///
/// * `settings` - HTTP and browser settings
/// * `job` - Input file, output directory, worker count and failure threshold
/// * `shutdown` - Resolves when the run should stop taking new tasks
///
/// # Returns
///
/// Per-outcome task counts. Fails only if the output directory is not
/// writable or the input cannot be read.
#[instrument(level = "info", skip(settings, shutdown))]
pub async fn download(
    settings: &Settings,
    job: &DownloadJob,
    shutdown: impl Future<Output = ()>,
) -> Result<DownloadReport> {
    ensure_writable_dir(&job.output_dir).await?;
    let tasks = tasks::load_tasks(&job.input, &job.output_dir).await?;
    info!(total = tasks.len(), "Total tasks");

    let fetcher = PageFetcher::new(settings)?;
    let state_path = job.output_dir.join(STATE_FILE);
    let failures = DomainFailures::load(&state_path, job.max_domain_failures).await;
    let ctx = DownloadContext {
        fetcher: &fetcher,
        failures: &failures,
        output_dir: &job.output_dir,
    };
    let options = PoolOptions {
        workers: job.workers,
        recycle_every: settings.browser.recycle_every,
    };

    let report = if job.use_browser {
        let make_session =
            |_: usize| ChromeSession::new(settings.browser.clone(), settings.user_agent.clone());
        run_pool(tasks, &ctx, &options, make_session, shutdown).await
    } else {
        run_pool(tasks, &ctx, &options, |_| NoBrowser, shutdown).await
    };

    if let Err(e) = failures.save(&state_path).await {
        warn!(error = %e, "Failed to save domain failure counts");
    }
    let blocked = failures.blocked_domains();
    if !blocked.is_empty() {
        info!(count = blocked.len(), domains = ?blocked, "Domains skipped for repeated failures");
    }
    info!(
        saved = report.saved(),
        via_http = report.saved_http,
        via_browser = report.saved_browser,
        pdf = report.saved_pdf,
        failed = report.failed,
        skipped_domain = report.skipped_domain,
        unprocessed = report.unprocessed,
        "Download run complete"
    );
    Ok(report)
}
