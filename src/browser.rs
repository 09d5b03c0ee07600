//! Headless browser rendering.
//!
//! [`PageRenderer`] is the seam between the download workers and whatever
//! produces rendered HTML. [`ChromeSession`] drives Chrome/Chromium over the
//! DevTools protocol. The browser process is launched lazily on the first
//! render, so workers that never need the fallback never start one.

use crate::config::BrowserSettings;
use crate::error::{Error, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Produces fully rendered page HTML for a URL.
pub trait PageRenderer {
    async fn render(&mut self, url: &str) -> Result<String>;

    /// Throw away the current session; the next render starts a fresh one.
    async fn recycle(&mut self) -> Result<()>;

    async fn shutdown(&mut self) -> Result<()>;
}

/// Renderer used when the browser fallback is switched off.
#[derive(Debug, Default)]
pub struct NoBrowser;

impl PageRenderer for NoBrowser {
    async fn render(&mut self, url: &str) -> Result<String> {
        Err(Error::Browser(format!("browser fallback disabled for {url}")))
    }

    async fn recycle(&mut self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct ChromeSession {
    settings: BrowserSettings,
    user_agent: String,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    launches: usize,
    /// Set once a launch fails; later renders fail fast instead of relaunching.
    launch_error: Option<String>,
}

impl std::fmt::Debug for ChromeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeSession")
            .field("headless", &self.settings.headless)
            .field("running", &self.browser.is_some())
            .field("launches", &self.launches)
            .field("launch_error", &self.launch_error)
            .finish()
    }
}

impl ChromeSession {
    pub fn new(settings: BrowserSettings, user_agent: impl Into<String>) -> Self {
        Self {
            settings,
            user_agent: user_agent.into(),
            browser: None,
            handler_task: None,
            launches: 0,
            launch_error: None,
        }
    }

    pub fn launches(&self) -> usize {
        self.launches
    }

    fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--user-agent={}", self.user_agent),
        ];
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }

    #[instrument(level = "info", skip(self), fields(headless = self.settings.headless))]
    async fn launch(&mut self) -> Result<()> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(self.settings.page_timeout_secs));
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        for arg in self.launch_args() {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| Error::BrowserUnavailable(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserUnavailable(format!("launch: {e}")))?;
        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        self.handler_task = Some(task);
        self.launches += 1;
        info!(launches = self.launches, "Browser launched");
        Ok(())
    }

    async fn ensure_browser(&mut self) -> Result<&Browser> {
        if let Some(reason) = &self.launch_error {
            return Err(Error::BrowserUnavailable(reason.clone()));
        }
        if self.browser.is_none() {
            if let Err(e) = self.launch().await {
                warn!(error = %e, "Browser failed to start; disabling it for this session");
                self.launch_error = Some(e.to_string());
                return Err(e);
            }
        }
        self.browser
            .as_ref()
            .ok_or_else(|| Error::Browser("browser is not running".into()))
    }

    async fn close_browser(&mut self) -> Result<()> {
        let closed = match self.browser.take() {
            Some(mut browser) => {
                let result = browser.close().await.map(|_| ());
                if let Err(e) = browser.wait().await {
                    debug!(error = %e, "Browser process wait failed");
                }
                result.map_err(Error::from)
            }
            None => Ok(()),
        };
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        closed
    }

    async fn open_page(&mut self, url: &str) -> Result<Page> {
        let page_timeout = Duration::from_secs(self.settings.page_timeout_secs);
        let browser = self.ensure_browser().await?;
        timeout(page_timeout, browser.new_page(url))
            .await
            .map_err(|_| Error::Timeout(format!("opening {url}")))?
            .map_err(Error::from)
    }

    /// Close every tab except `keep`; pop-ups and interstitials otherwise pile up.
    async fn close_other_tabs(&self, keep: &Page) {
        let Some(browser) = self.browser.as_ref() else {
            return;
        };
        match browser.pages().await {
            Ok(pages) => {
                for page in pages {
                    if page.target_id() != keep.target_id() {
                        if let Err(e) = page.close().await {
                            debug!(error = %e, "Failed to close extra tab");
                        }
                    }
                }
            }
            Err(e) => debug!(error = %e, "Could not list tabs"),
        }
    }

    async fn wait_until_ready(&self, page: &Page) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.settings.ready_timeout_secs);
        loop {
            let state: String = page
                .evaluate("document.readyState")
                .await?
                .into_value()?;
            if state == "complete" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!("document.readyState stuck at {state}")));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Scroll to the bottom until the page stops growing or the scroll budget
    /// is spent, so lazily loaded content is present.
    async fn scroll_to_bottom(&self, page: &Page) -> Result<()> {
        let pause = Duration::from_millis(self.settings.scroll_pause_ms);
        let mut last_height: i64 = page
            .evaluate("document.body.scrollHeight")
            .await?
            .into_value()?;

        for _ in 0..self.settings.max_scrolls {
            page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await?;
            sleep(pause).await;
            let new_height: i64 = page
                .evaluate("document.body.scrollHeight")
                .await?
                .into_value()?;
            if new_height == last_height {
                break;
            }
            last_height = new_height;
        }
        Ok(())
    }

    async fn load(&mut self, url: &str) -> Result<String> {
        let page = self.open_page(url).await?;
        self.close_other_tabs(&page).await;

        let loaded = async {
            self.wait_until_ready(&page).await?;
            self.scroll_to_bottom(&page).await?;
            Ok::<_, Error>(page.content().await?)
        }
        .await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close error");
        }
        loaded
    }

    /// Open `url` and return its HTML once an element matching `selector` is
    /// present, or fail with [`Error::Timeout`] after `wait`.
    #[instrument(level = "info", skip(self))]
    pub async fn render_when_present(
        &mut self,
        url: &str,
        selector: &str,
        wait: Duration,
    ) -> Result<String> {
        let page = self.open_page(url).await?;
        let deadline = Instant::now() + wait;

        let found = loop {
            if page.find_element(selector).await.is_ok() {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            sleep(POLL_INTERVAL).await;
        };

        let result = if found {
            info!("Page content loaded");
            page.content().await.map_err(Error::from)
        } else {
            Err(Error::Timeout(format!("{selector} did not appear on {url}")))
        };

        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close error");
        }
        result
    }
}

impl PageRenderer for ChromeSession {
    #[instrument(level = "info", skip(self))]
    async fn render(&mut self, url: &str) -> Result<String> {
        let html = self.load(url).await?;
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }

    async fn recycle(&mut self) -> Result<()> {
        info!(launches = self.launches, "Recycling browser session");
        self.close_browser().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.close_browser().await {
            warn!(error = %e, "Browser shutdown error");
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_without_browser() {
        let session = ChromeSession::new(BrowserSettings::default(), "agent");
        assert!(session.browser.is_none());
        assert_eq!(session.launches(), 0);
    }

    #[test]
    fn test_launch_args_include_user_agent_and_extras() {
        let settings = BrowserSettings {
            extra_args: vec!["--lang=en-US".to_string()],
            ..BrowserSettings::default()
        };
        let session = ChromeSession::new(settings, "agent/1.0");
        let args = session.launch_args();
        assert!(args.contains(&"--user-agent=agent/1.0".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[tokio::test]
    async fn test_recycle_and_shutdown_without_launch_are_noops() {
        let mut session = ChromeSession::new(BrowserSettings::default(), "agent");
        session.recycle().await.unwrap();
        session.shutdown().await.unwrap();
        assert_eq!(session.launches(), 0);
    }

    #[tokio::test]
    async fn test_failed_launch_is_remembered() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = BrowserSettings {
            chrome_executable: Some(tmp.path().join("no-such-chrome")),
            headless: true,
            ..BrowserSettings::default()
        };
        let mut session = ChromeSession::new(settings, "agent");

        let first = session.render("https://example.com/a").await;
        assert!(matches!(first, Err(Error::BrowserUnavailable(_))));
        assert!(session.launch_error.is_some());

        let second = session.render("https://example.com/b").await;
        assert!(matches!(second, Err(Error::BrowserUnavailable(_))));
        assert_eq!(session.launches(), 0);

        session.recycle().await.unwrap();
        assert!(session.launch_error.is_some());
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_browser_refuses_to_render() {
        let mut renderer = NoBrowser;
        let err = renderer.render("https://example.com").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
