//! Page through an interest's events and collect every unique event ID.

use crate::api::AggregatorApi;
use crate::error::Result;
use crate::outputs::json::write_json;
use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Request every offset in `offsets` (sorted by time), pausing `delay`
/// between requests. Failed pages are logged and skipped.
#[instrument(level = "info", skip(api))]
pub async fn collect(
    api: &AggregatorApi,
    interest_id: &str,
    offsets: Range<u32>,
    delay: Duration,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut event_ids = Vec::new();

    for offset in offsets {
        match api.interest_events(interest_id, offset, Some("time")).await {
            Ok(ids) => {
                let page_len = ids.len();
                for id in ids {
                    if seen.insert(id.clone()) {
                        event_ids.push(id);
                    }
                }
                info!(
                    offset,
                    collected = page_len,
                    total_unique = event_ids.len(),
                    "Collected event IDs"
                );
            }
            Err(e) => error!(offset, error = %e, "Failed to fetch event IDs"),
        }

        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    event_ids
}

pub async fn run(
    api: &AggregatorApi,
    interest_id: &str,
    offsets: Range<u32>,
    delay: Duration,
    output: &Path,
) -> Result<usize> {
    let event_ids = collect(api, interest_id, offsets, delay).await;
    write_json(output, &event_ids).await?;
    info!(count = event_ids.len(), path = %output.display(), "Saved unique event IDs");
    Ok(event_ids.len())
}
