//! Sources for every event in an `event_ids.json` file.
//!
//! A 404 means the event is gone and is skipped immediately. Any other
//! failure is retried with a fixed pause, up to the attempt limit.

use crate::api::AggregatorApi;
use crate::error::{Error, Result};
use crate::models::{EventRef, EventSources};
use crate::outputs::json::{read_json, write_json};
use crate::retry::Backoff;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct EventSourcesJob {
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for EventSourcesJob {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

fn retry_unless_not_found(e: &Error) -> bool {
    !e.is_not_found()
}

#[instrument(level = "info", skip(api, backoff))]
async fn fetch_one(api: &AggregatorApi, backoff: &Backoff, event_id: &str) -> Option<EventSources> {
    match backoff
        .run(event_id, retry_unless_not_found, || api.event_sources(event_id))
        .await
    {
        Ok(articles) => {
            info!("Fetched event sources");
            Some(EventSources {
                story_id: event_id.to_string(),
                articles,
            })
        }
        Err(e) if e.is_not_found() => {
            warn!("Event not found (404); skipping");
            None
        }
        Err(e) => {
            error!(error = %e, "Giving up on event");
            None
        }
    }
}

/// Fetch sources for the events listed in `input` and write them to `output`.
#[instrument(level = "info", skip(api, job))]
pub async fn run(
    api: &AggregatorApi,
    input: &Path,
    output: &Path,
    job: &EventSourcesJob,
) -> Result<usize> {
    let events: Vec<EventRef> = read_json(input).await?;
    let backoff = Backoff::fixed(job.max_attempts.saturating_sub(1), job.retry_delay);

    let mut saved = Vec::new();
    for event in &events {
        let Some(event_id) = event.id() else {
            error!(entry = ?event, "Missing event_id");
            continue;
        };
        if let Some(record) = fetch_one(api, &backoff, event_id).await {
            saved.push(record);
        }
    }

    write_json(output, &saved).await?;
    info!(
        saved = saved.len(),
        listed = events.len(),
        path = %output.display(),
        "Scraping complete"
    );
    Ok(saved.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_settings;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_job() -> EventSourcesJob {
        EventSourcesJob {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_server_errors_but_not_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/event/flaky/sources"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/event/flaky/sources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"title": "t"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/event/gone/sources"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/event/broken/sources"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("event_ids.json");
        std::fs::write(
            &input,
            r#"["flaky", {"event_id": "gone"}, {"nothing": true}, "broken"]"#,
        )
        .unwrap();
        let output = tmp.path().join("articles.json");

        let api = AggregatorApi::new(&test_settings(&server)).unwrap();
        let saved = run(&api, &input, &output, &fast_job()).await.unwrap();
        assert_eq!(saved, 1);

        let written: Value = read_json(&output).await.unwrap();
        assert_eq!(written[0]["story_id"], "flaky");
        assert_eq!(written[0]["articles"][0]["title"], "t");
    }
}
