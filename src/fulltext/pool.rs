//! The download worker pool.
//!
//! N workers share one task queue. Each owns its own [`PageRenderer`], so a
//! browser session is never shared between concurrent page loads. Workers
//! run as concurrent futures on the calling task and exit when the queue is
//! empty or the stop flag is set. HTML extraction and compression run on
//! the blocking pool so one large page does not stall the other workers.

use crate::browser::PageRenderer;
use crate::error::{Error, Result};
use crate::fulltext::domains::DomainFailures;
use crate::fulltext::extract::extract_article;
use crate::fulltext::fetch::PageFetcher;
use crate::fulltext::tasks::{article_path, html_path, pdf_path};
use crate::models::{Article, DownloadTask, FetchStrategy};
use crate::outputs::archive::write_gzip_html;
use crate::outputs::json::write_json;
use crate::utils::{domain_of, is_pdf_link};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// Shared, read-only state every worker needs.
#[derive(Debug, Clone, Copy)]
pub struct DownloadContext<'a> {
    pub fetcher: &'a PageFetcher,
    pub failures: &'a DomainFailures,
    pub output_dir: &'a Path,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    /// Recycle a worker's renderer after this many tasks; 0 disables.
    pub recycle_every: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Saved(FetchStrategy),
    SavedPdf,
    Failed,
    /// The URL has no host to fetch from.
    InvalidUrl,
    SkippedDomain,
}

impl TaskOutcome {
    /// Whether the task got as far as fetching, and so may have used the renderer.
    fn attempted(&self) -> bool {
        !matches!(self, TaskOutcome::InvalidUrl | TaskOutcome::SkippedDomain)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    pub saved_http: usize,
    pub saved_browser: usize,
    pub saved_pdf: usize,
    pub failed: usize,
    pub skipped_domain: usize,
    /// Tasks left in the queue when a stop was requested.
    pub unprocessed: usize,
}

impl DownloadReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Saved(FetchStrategy::Http) => self.saved_http += 1,
            TaskOutcome::Saved(FetchStrategy::Browser) => self.saved_browser += 1,
            TaskOutcome::SavedPdf => self.saved_pdf += 1,
            TaskOutcome::Failed | TaskOutcome::InvalidUrl => self.failed += 1,
            TaskOutcome::SkippedDomain => self.skipped_domain += 1,
        }
    }

    fn merge(&mut self, other: &DownloadReport) {
        self.saved_http += other.saved_http;
        self.saved_browser += other.saved_browser;
        self.saved_pdf += other.saved_pdf;
        self.failed += other.failed;
        self.skipped_domain += other.skipped_domain;
        self.unprocessed += other.unprocessed;
    }

    pub fn saved(&self) -> usize {
        self.saved_http + self.saved_browser + self.saved_pdf
    }

    pub fn processed(&self) -> usize {
        self.saved() + self.failed + self.skipped_domain
    }
}

#[derive(Debug)]
struct TaskQueue {
    inner: Mutex<VecDeque<DownloadTask>>,
}

impl TaskQueue {
    fn new(tasks: Vec<DownloadTask>) -> Self {
        Self {
            inner: Mutex::new(tasks.into()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DownloadTask>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pop(&self) -> Option<DownloadTask> {
        self.lock().pop_front()
    }

    /// Remove every queued task, returning how many were dropped.
    fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}

/// Extract on the blocking pool, handing the HTML back for archiving.
async fn extract_off_thread(
    html: String,
    url: &str,
    strategy: FetchStrategy,
) -> Result<(String, Article)> {
    let url = url.to_string();
    let extracted = tokio::task::spawn_blocking(move || {
        let article = extract_article(&html, &url, strategy);
        (html, article)
    })
    .await?;
    Ok(extracted)
}

/// Fetch the page over HTTP, falling back to the renderer when the fetch
/// fails or yields no article text.
async fn fetch_article<R: PageRenderer>(
    task: &DownloadTask,
    fetcher: &PageFetcher,
    renderer: &mut R,
) -> Result<(String, Article)> {
    match fetcher.fetch_html(&task.url).await {
        Ok(html) => {
            let (html, article) = extract_off_thread(html, &task.url, FetchStrategy::Http).await?;
            if article.has_maintext() {
                return Ok((html, article));
            }
            debug!(id = %task.id, "No article text over HTTP; trying browser");
        }
        Err(e) => debug!(id = %task.id, error = %e, "HTTP fetch failed; trying browser"),
    }

    let html = renderer.render(&task.url).await?;
    let (html, article) = extract_off_thread(html, &task.url, FetchStrategy::Browser).await?;
    if article.has_maintext() {
        Ok((html, article))
    } else {
        Err(Error::NoContent(task.url.clone()))
    }
}

async fn save_article<R: PageRenderer>(
    task: &DownloadTask,
    ctx: &DownloadContext<'_>,
    renderer: &mut R,
) -> Result<TaskOutcome> {
    let (html, article) = fetch_article(task, ctx.fetcher, renderer).await?;
    let strategy = article.fetched_with.unwrap_or(FetchStrategy::Http);

    write_gzip_html(&html_path(ctx.output_dir, &task.id), html).await?;
    write_json(&article_path(ctx.output_dir, &task.id), &article).await?;
    Ok(TaskOutcome::Saved(strategy))
}

async fn save_pdf(task: &DownloadTask, ctx: &DownloadContext<'_>) -> Result<TaskOutcome> {
    let dest = pdf_path(ctx.output_dir, &task.id);
    let bytes = ctx.fetcher.download_pdf(&task.url, &dest).await?;
    let record = json!({
        "url": task.url,
        "source_domain": domain_of(&task.url),
        "pdf_file": dest.file_name().map(|n| n.to_string_lossy().into_owned()),
        "bytes": bytes,
        "date_download": Utc::now(),
    });
    write_json(&article_path(ctx.output_dir, &task.id), &record).await?;
    Ok(TaskOutcome::SavedPdf)
}

/// Process a single task and update the domain failure counts.
#[instrument(level = "debug", skip(ctx, renderer), fields(id = %task.id, url = %task.url))]
pub async fn process_task<R: PageRenderer>(
    task: &DownloadTask,
    ctx: &DownloadContext<'_>,
    renderer: &mut R,
) -> TaskOutcome {
    let Some(domain) = domain_of(&task.url) else {
        warn!("Invalid URL");
        return TaskOutcome::InvalidUrl;
    };
    if ctx.failures.is_blocked(&domain) {
        debug!(%domain, "Skipping link from failing domain");
        return TaskOutcome::SkippedDomain;
    }

    let result = if is_pdf_link(&task.url) {
        save_pdf(task, ctx).await
    } else {
        save_article(task, ctx, renderer).await
    };

    match result {
        Ok(outcome) => {
            ctx.failures.record_success(&domain);
            outcome
        }
        Err(e) if e.is_local() => {
            warn!(%domain, error = %e, "Failed to download; not counted against domain");
            TaskOutcome::Failed
        }
        Err(e) => {
            let failures = ctx.failures.record_failure(&domain);
            warn!(%domain, failures, error = %e, "Failed to download");
            TaskOutcome::Failed
        }
    }
}

async fn run_worker<R: PageRenderer>(
    worker: usize,
    queue: &TaskQueue,
    ctx: &DownloadContext<'_>,
    mut renderer: R,
    stop: &AtomicBool,
    recycle_every: usize,
) -> DownloadReport {
    let mut report = DownloadReport::default();
    let mut processed = 0usize;
    let mut attempted = 0usize;

    while !stop.load(Ordering::SeqCst) {
        let Some(task) = queue.pop() else {
            break;
        };

        let outcome = process_task(&task, ctx, &mut renderer).await;
        info!(worker, id = %task.id, ?outcome, "Task finished");
        report.record(outcome);
        processed += 1;
        if !outcome.attempted() {
            continue;
        }
        attempted += 1;

        if recycle_every > 0 && attempted % recycle_every == 0 {
            if let Err(e) = renderer.recycle().await {
                warn!(worker, error = %e, "Renderer recycle failed");
            }
        }
    }

    if let Err(e) = renderer.shutdown().await {
        warn!(worker, error = %e, "Renderer shutdown failed");
    }
    debug!(worker, processed, attempted, "Worker exiting");
    report
}

/// Run `tasks` through `options.workers` workers until the queue is empty or
/// `shutdown` resolves. On shutdown the queue is drained and the workers
/// finish the task they are on before exiting.
///
/// # Arguments
///
/// * `tasks` - Tasks in the order they are handed out
/// * `ctx` - Fetcher, failure counts and output directory shared by workers
/// * `options` - Worker count and renderer recycle cadence
/// * `make_renderer` - Builds the renderer for worker `i`
/// * `shutdown` - Stop signal
///
/// # Returns
///
/// The merged report of every worker, with `unprocessed` set to the number
/// of tasks dropped from the queue on shutdown.
pub async fn run_pool<R, F, S>(
    tasks: Vec<DownloadTask>,
    ctx: &DownloadContext<'_>,
    options: &PoolOptions,
    make_renderer: F,
    shutdown: S,
) -> DownloadReport
where
    R: PageRenderer,
    F: FnMut(usize) -> R,
    S: Future<Output = ()>,
{
    let total = tasks.len();
    let queue = TaskQueue::new(tasks);
    let stop = AtomicBool::new(false);
    let workers = options.workers.max(1).min(total.max(1));
    info!(total, workers, "Starting workers");

    let worker_futures = (0..workers)
        .map(make_renderer)
        .enumerate()
        .map(|(i, renderer)| run_worker(i, &queue, ctx, renderer, &stop, options.recycle_every))
        .collect::<Vec<_>>();
    let all_workers = join_all(worker_futures);
    tokio::pin!(all_workers);

    let mut unprocessed = 0;
    let reports = tokio::select! {
        biased;
        _ = shutdown => {
            warn!("Interrupted; stopping workers");
            stop.store(true, Ordering::SeqCst);
            unprocessed = queue.clear();
            info!("Waiting for workers to finish");
            (&mut all_workers).await
        }
        reports = &mut all_workers => reports,
    };

    let mut report = DownloadReport {
        unprocessed,
        ..DownloadReport::default()
    };
    for worker_report in &reports {
        report.merge(worker_report);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_settings;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GOOD_PAGE: &str = r#"<html><head><title>Story</title></head><body>
        <article><p>This is a perfectly ordinary news paragraph with plenty of words.</p></article>
        </body></html>"#;
    const EMPTY_SHELL: &str = r#"<html><body><div id="app"></div></body></html>"#;

    #[derive(Clone, Default)]
    struct StubRenderer {
        html: Option<String>,
        cannot_launch: bool,
        renders: Arc<AtomicUsize>,
        recycles: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl StubRenderer {
        fn returning(html: &str) -> Self {
            Self {
                html: Some(html.to_string()),
                ..Self::default()
            }
        }
    }

    impl PageRenderer for StubRenderer {
        async fn render(&mut self, url: &str) -> Result<String> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if self.cannot_launch {
                return Err(Error::BrowserUnavailable("chrome not found".into()));
            }
            self.html
                .clone()
                .ok_or_else(|| Error::Browser(format!("stub cannot render {url}")))
        }

        async fn recycle(&mut self) -> Result<()> {
            self.recycles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn task(server: &MockServer, id: &str, route: &str) -> DownloadTask {
        DownloadTask {
            id: id.to_string(),
            url: format!("{}{}", server.uri(), route),
        }
    }

    async fn mount_page(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_slow_page(server: &MockServer, route: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(GOOD_PAGE)
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    fn options(workers: usize, recycle_every: usize) -> PoolOptions {
        PoolOptions {
            workers,
            recycle_every,
        }
    }

    #[tokio::test]
    async fn test_http_success_skips_browser() {
        let server = MockServer::start().await;
        mount_page(&server, "/good", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(3);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let mut renderer = StubRenderer::default();
        let outcome = process_task(&task(&server, "r1", "/good"), &ctx, &mut renderer).await;

        assert_eq!(outcome, TaskOutcome::Saved(FetchStrategy::Http));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
        assert!(html_path(tmp.path(), "r1").exists());
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(article_path(tmp.path(), "r1")).unwrap())
                .unwrap();
        assert_eq!(saved["fetched_with"], "http");
        assert_eq!(saved["title"], "Story");
    }

    #[tokio::test]
    async fn test_empty_page_falls_back_to_browser() {
        let server = MockServer::start().await;
        mount_page(&server, "/spa", 200, EMPTY_SHELL).await;
        mount_page(&server, "/blocked", 403, "no").await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(3);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let mut renderer = StubRenderer::returning(GOOD_PAGE);
        let spa = process_task(&task(&server, "spa", "/spa"), &ctx, &mut renderer).await;
        let blocked = process_task(&task(&server, "blk", "/blocked"), &ctx, &mut renderer).await;

        assert_eq!(spa, TaskOutcome::Saved(FetchStrategy::Browser));
        assert_eq!(blocked, TaskOutcome::Saved(FetchStrategy::Browser));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 2);
        let saved = std::fs::read_to_string(article_path(tmp.path(), "spa")).unwrap();
        assert!(saved.contains("\"fetched_with\": \"browser\""));
    }

    #[tokio::test]
    async fn test_total_failure_counts_against_domain() {
        let server = MockServer::start().await;
        mount_page(&server, "/empty", 200, EMPTY_SHELL).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(3);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let mut renderer = StubRenderer::returning(EMPTY_SHELL);
        let outcome = process_task(&task(&server, "e1", "/empty"), &ctx, &mut renderer).await;

        assert_eq!(outcome, TaskOutcome::Failed);
        assert!(!article_path(tmp.path(), "e1").exists());
        assert!(!html_path(tmp.path(), "e1").exists());
        assert_eq!(failures.count("127.0.0.1"), 1);
    }

    #[tokio::test]
    async fn test_pdf_links_are_saved_as_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .mount(&server)
            .await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(3);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let mut renderer = StubRenderer::default();
        let outcome = process_task(&task(&server, "p1", "/report.pdf"), &ctx, &mut renderer).await;

        assert_eq!(outcome, TaskOutcome::SavedPdf);
        assert_eq!(std::fs::read(pdf_path(tmp.path(), "p1")).unwrap(), b"%PDF-1.7");
        let record = std::fs::read_to_string(article_path(tmp.path(), "p1")).unwrap();
        assert!(record.contains("p1.pdf"));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_domain_is_skipped_after_threshold() {
        let server = MockServer::start().await;
        mount_page(&server, "/a", 404, "").await;
        mount_page(&server, "/b", 404, "").await;
        mount_page(&server, "/c", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(2);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let tasks = vec![
            task(&server, "a", "/a"),
            task(&server, "b", "/b"),
            task(&server, "c", "/c"),
        ];
        let report = run_pool(
            tasks,
            &ctx,
            &options(1, 0),
            |_| StubRenderer::default(),
            std::future::pending(),
        )
        .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped_domain, 1);
        assert_eq!(report.saved(), 0);
        assert!(!article_path(tmp.path(), "c").exists());
    }

    #[tokio::test]
    async fn test_workers_recycle_and_shut_down() {
        let server = MockServer::start().await;
        mount_page(&server, "/page", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(0);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let tasks: Vec<DownloadTask> = (0..5).map(|i| task(&server, &i.to_string(), "/page")).collect();
        let stub = StubRenderer::default();
        let shared = stub.clone();
        let report = run_pool(tasks, &ctx, &options(1, 2), move |_| shared.clone(), std::future::pending()).await;

        assert_eq!(report.saved_http, 5);
        assert_eq!(stub.recycles.load(Ordering::SeqCst), 2);
        assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 1);
        for i in 0..5 {
            assert!(article_path(tmp.path(), &i.to_string()).exists());
        }
    }

    #[tokio::test]
    async fn test_several_workers_share_the_queue() {
        let server = MockServer::start().await;
        mount_page(&server, "/page", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(0);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let tasks: Vec<DownloadTask> = (0..9).map(|i| task(&server, &format!("t{i}"), "/page")).collect();
        let stub = StubRenderer::default();
        let shared = stub.clone();
        let report = run_pool(tasks, &ctx, &options(4, 0), move |_| shared.clone(), std::future::pending()).await;

        assert_eq!(report.processed(), 9);
        assert_eq!(report.saved_http, 9);
        assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let server = MockServer::start().await;
        mount_page(&server, "/page", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(0);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let tasks: Vec<DownloadTask> = (0..3).map(|i| task(&server, &i.to_string(), "/page")).collect();
        let stub = StubRenderer::default();
        let shared = stub.clone();
        let report = run_pool(tasks, &ctx, &options(2, 0), move |_| shared.clone(), async {}).await;

        assert_eq!(report.processed(), 0);
        assert_eq!(report.unprocessed, 3);
        assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 2);
        assert!(!article_path(tmp.path(), "0").exists());
    }

    #[tokio::test]
    async fn test_shutdown_lets_running_tasks_finish() {
        let server = MockServer::start().await;
        mount_slow_page(&server, "/slow", Duration::from_millis(500)).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(0);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let tasks: Vec<DownloadTask> = (0..5).map(|i| task(&server, &i.to_string(), "/slow")).collect();
        let stub = StubRenderer::default();
        let shared = stub.clone();
        let stop_mid_fetch = tokio::time::sleep(Duration::from_millis(100));
        let report = run_pool(tasks, &ctx, &options(2, 0), move |_| shared.clone(), stop_mid_fetch).await;

        assert_eq!(report.saved_http, 2);
        assert_eq!(report.unprocessed, 3);
        assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 2);
        assert!(article_path(tmp.path(), "0").exists());
        assert!(article_path(tmp.path(), "1").exists());
        assert!(!article_path(tmp.path(), "2").exists());
    }

    #[tokio::test]
    async fn test_browser_that_cannot_launch_does_not_block_domain() {
        let server = MockServer::start().await;
        mount_page(&server, "/spa", 200, EMPTY_SHELL).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(2);
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };
        let broken = StubRenderer {
            cannot_launch: true,
            ..StubRenderer::default()
        };

        for _ in 0..2 {
            let tasks: Vec<DownloadTask> = (0..4).map(|i| task(&server, &format!("s{i}"), "/spa")).collect();
            let shared = broken.clone();
            let report = run_pool(tasks, &ctx, &options(1, 0), move |_| shared.clone(), std::future::pending()).await;
            assert_eq!(report.failed, 4);
            assert_eq!(report.skipped_domain, 0);
        }

        assert_eq!(failures.count("127.0.0.1"), 0);
        assert!(failures.blocked_domains().is_empty());
        assert_eq!(broken.renders.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_recycle_counts_only_fetched_tasks() {
        let server = MockServer::start().await;
        mount_page(&server, "/page", 200, GOOD_PAGE).await;
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = PageFetcher::new(&test_settings(&server)).unwrap();
        let failures = DomainFailures::new(1);
        failures.record_failure("blocked.example");
        let ctx = DownloadContext {
            fetcher: &fetcher,
            failures: &failures,
            output_dir: tmp.path(),
        };

        let mut tasks: Vec<DownloadTask> = (0..4)
            .map(|i| DownloadTask {
                id: format!("b{i}"),
                url: format!("https://blocked.example/{i}"),
            })
            .collect();
        tasks.push(DownloadTask {
            id: "bad".into(),
            url: "not a url".into(),
        });
        tasks.extend((0..2).map(|i| task(&server, &format!("g{i}"), "/page")));
        let stub = StubRenderer::default();
        let shared = stub.clone();
        let report = run_pool(tasks, &ctx, &options(1, 2), move |_| shared.clone(), std::future::pending()).await;

        assert_eq!(report.skipped_domain, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.saved_http, 2);
        assert_eq!(stub.recycles.load(Ordering::SeqCst), 1);
    }
}
