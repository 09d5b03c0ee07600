//! Collectors for the news aggregator's story and event data.
//!
//! Each submodule backs one subcommand and writes its results as JSON files
//! that later steps read back in.
//!
//! # Collectors
//!
//! | Step | Module | Method | Output |
//! |------|--------|--------|--------|
//! | Story IDs | [`story_ids`] | interest events API | `{interest}.json` per interest |
//! | Story sources | [`news_sources`] | `sourcesForWeb` API | `news_source_{id}.json` per story |
//! | Merge | [`aggregate`] | local files | one story collection |
//! | Event IDs | [`topic_events`] | interest events API, paged | `event_ids.json` |
//! | Event sources | [`event_sources`] | event sources API | `articles.json` |
//! | Topic page | [`topic_stories`] | browser render + `sourcesForWeb` | `scraped_articles_{tag}.json` |
//!
//! # Common Patterns
//!
//! - Concurrent requests with `futures::stream`, bounded per collector
//! - Failed requests are logged and skipped; a run only fails on local I/O
//! - Output is written atomically with [`crate::outputs::json::write_json`]

pub mod aggregate;
pub mod event_sources;
pub mod news_sources;
pub mod story_ids;
pub mod topic_events;
pub mod topic_stories;
