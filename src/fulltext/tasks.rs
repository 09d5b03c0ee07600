//! Building the download task list.
//!
//! Input is either a story collection (JSON) or an `index,url` CSV from
//! `url-map`. A task whose `<id>.json` already exists in the output
//! directory was finished by an earlier run and is left out.

use crate::error::Result;
use crate::models::{DownloadTask, StoryCollection, UrlRow};
use crate::outputs::json::read_json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub fn article_path(output_dir: &Path, id: &str) -> PathBuf {
    output_dir.join(format!("{id}.json"))
}

pub fn html_path(output_dir: &Path, id: &str) -> PathBuf {
    output_dir.join(format!("{id}.html.gz"))
}

pub fn pdf_path(output_dir: &Path, id: &str) -> PathBuf {
    output_dir.join(format!("{id}.pdf"))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Every source with both an ID and a URL, in story order.
pub fn tasks_from_collection(collection: &StoryCollection) -> Vec<DownloadTask> {
    collection
        .values()
        .flat_map(|story| story.sources.iter())
        .filter_map(|source| match (&source.ref_id, &source.url) {
            (Some(id), Some(url)) if !id.is_empty() && !url.is_empty() => Some(DownloadTask {
                id: id.clone(),
                url: url.clone(),
            }),
            _ => None,
        })
        .collect()
}

pub fn read_url_rows(path: &Path) -> Result<Vec<UrlRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn tasks_from_rows(rows: Vec<UrlRow>) -> Vec<DownloadTask> {
    rows.into_iter()
        .map(|row| DownloadTask {
            id: row.index.to_string(),
            url: row.url,
        })
        .collect()
}

/// Load `input` and drop duplicate IDs and tasks already done in `output_dir`.
///
/// # Arguments
///
/// * `input` - A story collection (`.json`) or `index,url` CSV (`.csv`)
/// * `output_dir` - Directory checked for existing `<id>.json` files
///
/// # Returns
///
/// Pending tasks in input order, or an error if `input` cannot be read.
#[instrument(level = "info")]
pub async fn load_tasks(input: &Path, output_dir: &Path) -> Result<Vec<DownloadTask>> {
    let candidates = if is_csv(input) {
        tasks_from_rows(read_url_rows(input)?)
    } else {
        let collection: StoryCollection = read_json(input).await?;
        tasks_from_collection(&collection)
    };

    let listed = candidates.len();
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    let mut done = 0usize;
    for task in candidates {
        if !seen.insert(task.id.clone()) {
            continue;
        }
        if article_path(output_dir, &task.id).exists() {
            debug!(id = %task.id, "Already downloaded");
            done += 1;
            continue;
        }
        tasks.push(task);
    }

    info!(listed, already_done = done, pending = tasks.len(), "Built task list");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "story-a": {"sources": [
            {"refId": "r1", "url": "https://a.com/1"},
            {"refId": "r2", "url": "https://b.com/2"},
            {"url": "https://no-id.com"},
            {"refId": "r3"}
        ]},
        "story-b": {"sources": [
            {"refId": "r1", "url": "https://a.com/1"},
            {"refId": "r4", "url": "https://c.com/4"}
        ]}
    }"#;

    #[tokio::test]
    async fn test_collection_tasks_dedupe_and_resume() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("stories.json");
        std::fs::write(&input, COLLECTION).unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(article_path(&out, "r2"), "{}").unwrap();

        let tasks = load_tasks(&input, &out).await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r4"]);
        assert_eq!(tasks[0].url, "https://a.com/1");
    }

    #[tokio::test]
    async fn test_csv_tasks_use_index_as_id() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("urls.csv");
        std::fs::write(&input, "index,url\n0,https://a.com/x\n1,https://b.com/y\n").unwrap();

        let tasks = load_tasks(&input, tmp.path()).await.unwrap();
        assert_eq!(
            tasks,
            vec![
                DownloadTask {
                    id: "0".into(),
                    url: "https://a.com/x".into()
                },
                DownloadTask {
                    id: "1".into(),
                    url: "https://b.com/y".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_tasks(&tmp.path().join("nope.json"), tmp.path()).await.is_err());
    }
}
