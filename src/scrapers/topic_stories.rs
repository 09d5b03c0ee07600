//! Stories listed on a rendered topic page.
//!
//! The topic page only lists its stories after client-side rendering, so it
//! is loaded in the browser. Story IDs are then pulled out of the page
//! source and each story's data comes from the API.

use crate::api::AggregatorApi;
use crate::browser::ChromeSession;
use crate::error::{Error, Result};
use crate::models::ArticleInfo;
use crate::outputs::json::write_json;
use crate::utils::{extract_uuids, truncate_for_log};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Element that only appears once story cards have rendered.
pub const STORY_CARD_SELECTOR: &str = ".text-22";

#[derive(Debug, Clone)]
pub struct TopicStoriesJob {
    pub href: String,
    pub tag: String,
    pub relevant_only: bool,
    pub concurrency: usize,
    pub wait: Duration,
    pub output_dir: PathBuf,
}

pub fn output_path(output_dir: &Path, tag: &str) -> PathBuf {
    output_dir.join(format!("scraped_articles_{tag}.json"))
}

/// Fetch one story's data, logging why it was skipped on failure.
#[instrument(level = "info", skip(api))]
pub async fn get_story_data(api: &AggregatorApi, story_id: &str) -> Option<Value> {
    match api.story_sources(story_id).await {
        Ok(data) => Some(data),
        Err(e) => {
            match e.status() {
                Some(404) => warn!("Story not found in API"),
                Some(502) => warn!("Server issue (502 Bad Gateway); retry later"),
                Some(status) => warn!(
                    status,
                    error = %truncate_for_log(&e.to_string(), 200),
                    "Unexpected status"
                ),
                None => error!(error = %e, "Request failed"),
            }
            None
        }
    }
}

/// Fetch every story in `story_ids`, keeping input order and dropping failures.
pub async fn fetch_stories(
    api: &AggregatorApi,
    story_ids: &[String],
    concurrency: usize,
) -> Vec<Value> {
    stream::iter(story_ids.iter())
        .map(|id| get_story_data(api, id))
        .buffered(concurrency.max(1))
        .filter_map(|story| std::future::ready(story))
        .collect()
        .await
}

/// Shape the output: raw story documents, or per-source summaries.
pub fn build_output(stories: Vec<Value>, relevant_only: bool) -> Value {
    if relevant_only {
        let summaries: Vec<Vec<ArticleInfo>> =
            stories.iter().map(ArticleInfo::from_story).collect();
        serde_json::to_value(summaries).unwrap_or(Value::Null)
    } else {
        Value::Array(stories)
    }
}

/// Run the job. Returns how many stories were written, 0 when the page never
/// rendered or no story could be fetched.
#[instrument(level = "info", skip_all, fields(href = %job.href, tag = %job.tag))]
pub async fn run(
    api: &AggregatorApi,
    session: &mut ChromeSession,
    job: &TopicStoriesJob,
) -> Result<usize> {
    let url = format!("{}{}", api.site_base(), job.href);
    info!(%url, "Extracting story IDs");

    let html = match session
        .render_when_present(&url, STORY_CARD_SELECTOR, job.wait)
        .await
    {
        Ok(html) => html,
        Err(Error::Timeout(what)) => {
            warn!(%what, "Stories did not load");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let story_ids = extract_uuids(&html);
    if story_ids.is_empty() {
        warn!("No story IDs found in page");
        return Ok(0);
    }
    info!(count = story_ids.len(), "Found story IDs");

    let stories = fetch_stories(api, &story_ids, job.concurrency).await;
    if stories.is_empty() {
        warn!("No stories fetched");
        return Ok(0);
    }

    let count = stories.len();
    let path = output_path(&job.output_dir, &job.tag);
    tokio::fs::create_dir_all(&job.output_dir).await?;
    write_json(&path, &build_output(stories, job.relevant_only)).await?;
    info!(count, path = %path.display(), "Saved stories");
    Ok(count)
}
