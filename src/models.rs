//! Data models for aggregator responses and scraped articles.
//!
//! The aggregator's responses are passed through as raw JSON wherever
//! possible. Only the fields the jobs act on are modelled, and every one of
//! them is optional so a shape change degrades to "skipped" rather than a
//! parse failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Page of event IDs returned by the interest events endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct EventIdsPage {
    #[serde(rename = "eventIds", default)]
    pub event_ids: Vec<String>,
}

/// One entry of an `event_ids.json` input: a bare ID or `{"event_id": ...}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EventRef {
    Id(String),
    Object {
        #[serde(default)]
        event_id: Option<String>,
    },
    Other(Value),
}

impl EventRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            EventRef::Id(id) if !id.is_empty() => Some(id),
            EventRef::Object { event_id: Some(id) } if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

/// Sources fetched for one event.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventSources {
    pub story_id: String,
    pub articles: Value,
}

/// Story ID → story document, as produced by `aggregate`.
pub type StoryCollection = BTreeMap<String, StoryDoc>;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoryDoc {
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// A publisher article listed under a story.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceRef {
    #[serde(rename = "refId", default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// Reader-facing summary of one source of a story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleInfo {
    pub title: String,
    pub summary: String,
    pub media_source: String,
    pub bias: String,
    pub source_link: String,
    pub published_date: String,
}

impl ArticleInfo {
    /// Project every entry of a story's `sources` array. Returns an empty list
    /// when the document has no `sources`.
    pub fn from_story(story: &Value) -> Vec<ArticleInfo> {
        let Some(sources) = story.get("sources").and_then(Value::as_array) else {
            return Vec::new();
        };

        sources
            .iter()
            .map(|source| {
                let field = |key: &str, default: &str| -> String {
                    source
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or(default)
                        .to_string()
                };
                let info_field = |key: &str| -> String {
                    source
                        .get("sourceInfo")
                        .and_then(|i| i.get(key))
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string()
                };

                ArticleInfo {
                    title: field("title", "Unknown"),
                    summary: field("originalDescription", "No summary available"),
                    media_source: info_field("name"),
                    bias: info_field("bias"),
                    source_link: field("url", "No link available"),
                    published_date: field("date", "Unknown"),
                }
            })
            .collect()
    }
}

/// Row of the URL mapping CSV.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UrlRow {
    pub index: u64,
    pub url: String,
}

/// One page to download: the file stem used for outputs and its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
}

/// How the page HTML for an article was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    Http,
    Browser,
}

/// Article extracted from a publisher page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub source_domain: Option<String>,
    pub title: Option<String>,
    pub title_page: Option<String>,
    pub description: Option<String>,
    pub maintext: Option<String>,
    pub authors: Vec<String>,
    pub date_publish: Option<String>,
    pub date_download: DateTime<Utc>,
    pub language: Option<String>,
    pub image_url: Option<String>,
    pub fetched_with: Option<FetchStrategy>,
}

impl Article {
    pub fn has_maintext(&self) -> bool {
        self.maintext
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}
