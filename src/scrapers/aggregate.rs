//! Merge per-story source files into a single story collection.
//!
//! The result maps every story ID to its source document and is the input
//! format of both `url-map` and `download`.

use crate::error::Result;
use crate::models::{StoryCollection, StoryDoc};
use crate::outputs::json::{read_json, write_json};
use crate::scrapers::news_sources::story_id_from_file_name;
use std::path::Path;
use tracing::{error, info, instrument};

/// Read every `news_source_<id>.json` in `input_dir`.
#[instrument(level = "info")]
pub async fn collect(input_dir: &Path) -> Result<StoryCollection> {
    let mut entries = tokio::fs::read_dir(input_dir).await?;
    let mut collection = StoryCollection::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(story_id) = story_id_from_file_name(&name) else {
            continue;
        };
        match read_json::<StoryDoc>(&entry.path()).await {
            Ok(doc) => {
                collection.insert(story_id.to_string(), doc);
            }
            Err(e) => error!(file = %name, error = %e, "Error reading source file"),
        }
    }

    info!(stories = collection.len(), "Aggregated story sources");
    Ok(collection)
}

pub async fn run(input_dir: &Path, output: &Path) -> Result<usize> {
    let collection = collect(input_dir).await?;
    write_json(output, &collection).await?;
    info!(path = %output.display(), stories = collection.len(), "Wrote story collection");
    Ok(collection.len())
}
