//! Source documents for a list of story IDs.
//!
//! Reads a JSON array of story IDs and saves each story's `sourcesForWeb`
//! document as `news_source_<id>.json`. Stories whose file already exists
//! are not requested again, so a rerun only fills the gaps.

use crate::api::AggregatorApi;
use crate::error::Result;
use crate::outputs::json::{read_json, write_json};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

pub const FILE_PREFIX: &str = "news_source_";

pub fn output_path(output_dir: &Path, story_id: &str) -> PathBuf {
    output_dir.join(format!("{FILE_PREFIX}{story_id}.json"))
}

/// Story ID encoded in a `news_source_<id>.json` file name.
pub fn story_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(".json")
        .filter(|id| !id.is_empty())
}

fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourcesReport {
    pub saved: usize,
    pub existing: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Saved,
    Existing,
    Failed,
}

#[instrument(level = "info", skip(api, output_dir))]
async fn process_story_id(api: &AggregatorApi, story_id: &str, output_dir: &Path) -> Outcome {
    let path = output_path(output_dir, story_id);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Already downloaded");
        return Outcome::Existing;
    }

    let data = match api.story_sources(story_id).await {
        Ok(data) => data,
        Err(e) => {
            error!(error = %e, "Error fetching story");
            return Outcome::Failed;
        }
    };
    if is_empty_document(&data) {
        warn!("Story returned an empty document");
        return Outcome::Failed;
    }

    match write_json(&path, &data).await {
        Ok(()) => {
            info!(path = %path.display(), "Saved news source");
            Outcome::Saved
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to write news source");
            Outcome::Failed
        }
    }
}

/// Download sources for every ID in `ids_file` into `output_dir`.
#[instrument(level = "info", skip(api))]
pub async fn run(
    api: &AggregatorApi,
    ids_file: &Path,
    output_dir: &Path,
    concurrency: usize,
) -> Result<SourcesReport> {
    tokio::fs::create_dir_all(output_dir).await?;
    let story_ids: Vec<String> = read_json(ids_file).await?;
    info!(count = story_ids.len(), "Loaded story IDs");

    let outcomes: Vec<Outcome> = stream::iter(story_ids.iter())
        .map(|id| process_story_id(api, id, output_dir))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = SourcesReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Saved => report.saved += 1,
            Outcome::Existing => report.existing += 1,
            Outcome::Failed => report.failed += 1,
        }
    }
    info!(
        saved = report.saved,
        existing = report.existing,
        failed = report.failed,
        "News source download complete"
    );
    Ok(report)
}
