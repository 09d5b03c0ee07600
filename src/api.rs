//! Client for the aggregator's web API.
//!
//! Three endpoints are used:
//!
//! | Endpoint | Method | Returns |
//! |----------|--------|---------|
//! | `/api/public/interest/{id}/events` | [`AggregatorApi::interest_events`] | event/story IDs for an interest |
//! | `/api/v06/story/{id}/sourcesForWeb` | [`AggregatorApi::story_sources`] | raw source document of a story |
//! | `/api/public/event/{id}/sources` | [`AggregatorApi::event_sources`] | raw source list of an event |
//!
//! Response bodies are returned as untyped JSON except for the ID list.
//! Non-success statuses become [`Error::Status`] so callers can tell a 404
//! from a server hiccup.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::EventIdsPage;
use reqwest::header::{ACCEPT, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct AggregatorApi {
    client: Client,
    api_base: String,
    site_base: String,
    user_agent: String,
}

impl AggregatorApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            site_base: settings.site_base.trim_end_matches('/').to_string(),
            user_agent: settings.user_agent.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let t0 = Instant::now();
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        debug!(
            url = %response.url(),
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "API response"
        );
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    /// IDs listed for an interest at the given offset, optionally sorted
    /// server-side (e.g. `"time"`).
    #[instrument(level = "debug", skip(self))]
    pub async fn interest_events(
        &self,
        interest_id: &str,
        offset: u32,
        sort: Option<&str>,
    ) -> Result<Vec<String>> {
        let url = self.endpoint(&format!(
            "/api/public/interest/{}/events",
            urlencoding::encode(interest_id)
        ));
        let mut request = self.client.get(url);
        if let Some(sort) = sort {
            request = request.query(&[("sort", sort)]);
        }
        request = request.query(&[("offset", offset)]);

        let page: EventIdsPage = self.send(request).await?.json().await?;
        Ok(page.event_ids)
    }

    /// The `sourcesForWeb` document of a story.
    #[instrument(level = "debug", skip(self))]
    pub async fn story_sources(&self, story_id: &str) -> Result<Value> {
        let url = self.endpoint(&format!(
            "/api/v06/story/{}/sourcesForWeb",
            urlencoding::encode(story_id)
        ));
        Ok(self.send(self.client.get(url)).await?.json().await?)
    }

    /// The source list of an event. This endpoint wants the site as referer
    /// and the web client marker header.
    #[instrument(level = "debug", skip(self))]
    pub async fn event_sources(&self, event_id: &str) -> Result<Value> {
        let url = self.endpoint(&format!(
            "/api/public/event/{}/sources",
            urlencoding::encode(event_id)
        ));
        let request = self
            .client
            .get(url)
            .header(REFERER, format!("{}/", self.site_base))
            .header("x-gn-v", "web");
        Ok(self.send(request).await?.json().await?)
    }

    pub fn site_base(&self) -> &str {
        &self.site_base
    }
}
