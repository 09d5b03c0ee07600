//! Top-n story IDs per interest.
//!
//! For every interest ID, one request to the interest events endpoint; the
//! first `n` IDs go to `story_ids_<interest>.json`. A failed request is
//! logged and still produces a file, holding an empty list.

use crate::api::AggregatorApi;
use crate::error::Result;
use crate::outputs::json::write_json;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

#[derive(Debug, Clone)]
pub struct StoryIdsJob {
    pub interests: Vec<String>,
    pub n: usize,
    pub offset: u32,
    pub concurrency: usize,
    pub output_dir: PathBuf,
}

pub fn output_path(output_dir: &Path, interest_id: &str) -> PathBuf {
    output_dir.join(format!("story_ids_{interest_id}.json"))
}

/// Fetch the IDs for one interest, treating failure as an empty list.
async fn fetch_story_ids(api: &AggregatorApi, interest_id: &str, offset: u32) -> Vec<String> {
    match api.interest_events(interest_id, offset, None).await {
        Ok(ids) => ids,
        Err(e) => {
            error!(interest_id, error = %e, "Error fetching interest events");
            Vec::new()
        }
    }
}

#[instrument(level = "info", skip(api, output_dir))]
async fn process_interest(
    api: &AggregatorApi,
    interest_id: &str,
    offset: u32,
    n: usize,
    output_dir: &Path,
) -> Result<usize> {
    let mut story_ids = fetch_story_ids(api, interest_id, offset).await;
    story_ids.truncate(n);

    let path = output_path(output_dir, interest_id);
    write_json(&path, &story_ids).await?;
    info!(count = story_ids.len(), path = %path.display(), "Saved story IDs");
    Ok(story_ids.len())
}

/// Run the job. Returns the number of files written.
#[instrument(level = "info", skip_all, fields(interests = job.interests.len()))]
pub async fn run(api: &AggregatorApi, job: &StoryIdsJob) -> Result<usize> {
    tokio::fs::create_dir_all(&job.output_dir).await?;

    let results: Vec<Result<usize>> = stream::iter(job.interests.iter())
        .map(|interest_id| process_interest(api, interest_id, job.offset, job.n, &job.output_dir))
        .buffer_unordered(job.concurrency.max(1))
        .collect()
        .await;

    let mut written = 0;
    for result in results {
        match result {
            Ok(_) => written += 1,
            Err(e) => error!(error = %e, "Failed to write story IDs file"),
        }
    }
    info!(written, "Story ID collection complete");
    Ok(written)
}
