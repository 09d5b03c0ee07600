//! Plain HTTP fetching of publisher pages and PDF documents.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::retry::Backoff;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// How a PDF download attempt reads the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PdfMode {
    Streamed,
    Buffered,
    Insecure,
}

#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    insecure_client: Client,
    user_agent: String,
    backoff: Backoff,
}

impl PageFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let insecure_client = Client::builder()
            .timeout(settings.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            insecure_client,
            user_agent: settings.user_agent.clone(),
            backoff: Backoff::exponential(settings.http_retries, settings.retry_base_delay()),
        })
    }

    async fn get_once(&self, client: &Client, url: &str) -> Result<reqwest::Response> {
        let response = client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// GET `url`, retrying server errors and connection failures.
    async fn get(&self, client: &Client, url: &str) -> Result<reqwest::Response> {
        self.backoff
            .run(url, Error::is_transient, || self.get_once(client, url))
            .await
    }

    /// Fetch the HTML of a page.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.get(&self.client, url).await?;
        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    async fn download_pdf_once(&self, url: &str, dest: &Path, mode: PdfMode) -> Result<u64> {
        let client = match mode {
            PdfMode::Insecure => &self.insecure_client,
            PdfMode::Streamed | PdfMode::Buffered => &self.client,
        };
        let mut response = self.get(client, url).await?;
        let mut file = File::create(dest).await?;

        let written = match mode {
            PdfMode::Streamed => {
                let mut total = 0u64;
                while let Some(chunk) = response.chunk().await? {
                    file.write_all(&chunk).await?;
                    total += chunk.len() as u64;
                }
                total
            }
            PdfMode::Buffered | PdfMode::Insecure => {
                let bytes = response.bytes().await?;
                file.write_all(&bytes).await?;
                bytes.len() as u64
            }
        };
        file.flush().await?;
        Ok(written)
    }

    /// Download a PDF to `dest`: streamed first, then buffered, then with
    /// certificate verification disabled. Returns the number of bytes saved.
    #[instrument(level = "info", skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download_pdf(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut last_err = None;
        for mode in [PdfMode::Streamed, PdfMode::Buffered, PdfMode::Insecure] {
            match self.download_pdf_once(url, dest, mode).await {
                Ok(bytes) => {
                    info!(bytes, ?mode, "Saved PDF");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(?mode, error = %e, "PDF download attempt failed");
                    last_err = Some(e);
                }
            }
        }
        let _ = tokio::fs::remove_file(dest).await;
        Err(last_err.unwrap_or_else(|| Error::NoContent(url.to_string())))
    }
}
