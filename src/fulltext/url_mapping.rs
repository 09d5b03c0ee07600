//! Collect new source URLs from story collections into an `index,url` CSV.
//!
//! Only the stories with the most sources in each file are used. Indices
//! continue from the largest one already in the CSV, so a row's index never
//! changes once written and can serve as a stable download ID.

use crate::error::Result;
use crate::fulltext::tasks::read_url_rows;
use crate::models::{StoryCollection, StoryDoc, UrlRow};
use crate::outputs::json::read_json;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

/// URLs of the `limit` stories with the most sources, in that order.
pub fn top_story_urls(collection: &StoryCollection, limit: usize) -> Vec<String> {
    let mut stories: Vec<&StoryDoc> = collection.values().collect();
    stories.sort_by_key(|story| Reverse(story.sources.len()));

    stories
        .into_iter()
        .take(limit)
        .flat_map(|story| story.sources.iter())
        .filter_map(|source| source.url.clone())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Append `urls` not already present in `rows`, numbering from the largest
/// existing index. Returns how many rows were added.
pub fn append_new_urls(rows: &mut Vec<UrlRow>, urls: impl IntoIterator<Item = String>) -> usize {
    let mut known: HashSet<String> = rows.iter().map(|r| r.url.clone()).collect();
    let mut next_index = rows.iter().map(|r| r.index + 1).max().unwrap_or(0);
    let before = rows.len();

    for url in urls {
        if known.insert(url.clone()) {
            rows.push(UrlRow {
                index: next_index,
                url,
            });
            next_index += 1;
        }
    }
    rows.len() - before
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn write_rows(path: &Path, rows: &[UrlRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Add new URLs from every story collection in `json_dir` to `csv_file`.
/// The CSV is only rewritten when something was added.
///
/// # Arguments
///
/// * `json_dir` - Directory of story collection `.json` files
/// * `csv_file` - Mapping to extend; created when missing
/// * `limit` - Stories taken from each file, largest first
///
/// # Returns
///
/// How many rows were added. Unreadable collection files are logged and
/// skipped.
#[instrument(level = "info")]
pub async fn run(json_dir: &Path, csv_file: &Path, limit: usize) -> Result<usize> {
    let mut rows = if csv_file.exists() {
        read_url_rows(csv_file)?
    } else {
        Vec::new()
    };
    debug!(existing = rows.len(), "Loaded URL mapping");

    let mut added = 0;
    for file in json_files(json_dir).await? {
        match read_json::<StoryCollection>(&file).await {
            Ok(collection) => {
                added += append_new_urls(&mut rows, top_story_urls(&collection, limit));
            }
            Err(e) => error!(file = %file.display(), error = %e, "Error reading story collection"),
        }
    }

    if added > 0 {
        write_rows(csv_file, &rows)?;
        info!(added, path = %csv_file.display(), "Added new URLs");
    } else {
        info!("No new URLs found");
    }
    Ok(added)
}
