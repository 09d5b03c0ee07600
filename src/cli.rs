//! Command-line interface definitions for News Harvest.
//!
//! Each scraping job is a subcommand. Global options (config file, API base,
//! user agent) apply to all of them and can also come from environment
//! variables.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the News Harvest application.
///
/// # Examples
///
/// ```sh
/// # Top 5 story IDs for two interests
/// news_harvest story-ids --events 453a847a-ac24-45d3-a937-63fc9d6a1318 other-id --n 5
///
/// # Source documents for those stories
/// news_harvest sources --file story_ids_453a847a-ac24-45d3-a937-63fc9d6a1318.json --output-dir sources_output
///
/// # Full article text with 8 workers
/// news_harvest download --input stories.json --output-dir downloads --workers 8
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true, env = "NEWS_HARVEST_CONFIG")]
    pub config: Option<String>,

    /// Base URL of the aggregator web API
    #[arg(long, global = true, env = "NEWS_HARVEST_API_BASE")]
    pub api_base: Option<String>,

    /// Base URL of the aggregator website (topic pages, Referer header)
    #[arg(long, global = true, env = "NEWS_HARVEST_SITE_BASE")]
    pub site_base: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "NEWS_HARVEST_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get the top n story IDs for a list of interest IDs, one file per interest
    StoryIds(StoryIdsArgs),
    /// Download the source list of every story ID in a JSON file
    Sources(SourcesArgs),
    /// Merge a directory of downloaded source files into one story collection
    Aggregate(AggregateArgs),
    /// Page through an interest's events and collect every unique event ID
    TopicEvents(TopicEventsArgs),
    /// Fetch the sources of every event listed in an event ID file
    EventSources(EventSourcesArgs),
    /// Render a topic page in the browser and fetch data for every story on it
    TopicStories(TopicStoriesArgs),
    /// Append new source URLs from story collections to a CSV mapping
    UrlMap(UrlMapArgs),
    /// Download full article text for every source URL
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct StoryIdsArgs {
    /// Interest IDs (space separated)
    #[arg(long, num_args = 1.., required = true)]
    pub events: Vec<String>,

    /// Number of top story IDs to save per interest
    #[arg(long, default_value_t = 10)]
    pub n: usize,

    /// Offset parameter for the API
    #[arg(long, default_value_t = 100)]
    pub offset: u32,

    /// Maximum number of concurrent requests
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Directory the story_ids_<id>.json files are written to
    #[arg(long, default_value = ".")]
    pub output_dir: String,
}

#[derive(Args, Debug)]
pub struct SourcesArgs {
    /// JSON file containing story IDs (output of `story-ids`)
    #[arg(long)]
    pub file: String,

    /// Directory to save news source files
    #[arg(long, default_value = "news_sources")]
    pub output_dir: String,

    /// Maximum number of concurrent requests
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Directory of news_source_<id>.json files
    #[arg(long)]
    pub input_dir: String,

    /// Story collection file to write
    #[arg(long, default_value = "stories.json")]
    pub output: String,
}

#[derive(Args, Debug)]
pub struct TopicEventsArgs {
    /// Interest ID to page through
    #[arg(long)]
    pub interest: String,

    /// First offset requested
    #[arg(long, default_value_t = 1)]
    pub start_offset: u32,

    /// Offset to stop before
    #[arg(long, default_value_t = 9900)]
    pub end_offset: u32,

    /// Pause between requests in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Output file
    #[arg(long, default_value = "event_ids.json")]
    pub output: String,
}

#[derive(Args, Debug)]
pub struct EventSourcesArgs {
    /// JSON file of event IDs (strings or objects with an `event_id` field)
    #[arg(long, default_value = "event_ids.json")]
    pub input: String,

    /// Output file
    #[arg(long, default_value = "articles.json")]
    pub output: String,

    /// Attempts per event before giving up
    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,

    /// Pause between attempts in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,
}

#[derive(Args, Debug)]
pub struct TopicStoriesArgs {
    /// The topic href to extract stories from
    #[arg(long, default_value = "/interest/gun-control")]
    pub href: String,

    /// Tag for output file versioning
    #[arg(long, default_value = "latest")]
    pub tag: String,

    /// Run the browser in headless mode
    #[arg(long)]
    pub headless: bool,

    /// Reduce each story to its per-source summary records
    #[arg(long)]
    pub relevant_only: bool,

    /// Maximum number of concurrent story requests
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Seconds to wait for story cards to appear
    #[arg(long, default_value_t = 20)]
    pub wait_secs: u64,

    /// Directory the output file is written to
    #[arg(long, default_value = ".")]
    pub output_dir: String,
}

#[derive(Args, Debug)]
pub struct UrlMapArgs {
    /// Directory containing story collection JSON files
    pub json_dir: String,

    /// CSV file path to read and update
    pub csv_file: String,

    /// Stories (with the most sources) taken from each file
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Story collection JSON, or an index,url CSV
    #[arg(long)]
    pub input: String,

    /// Directory articles and page archives are written to
    #[arg(long, default_value = "data/downloads")]
    pub output_dir: String,

    /// Number of concurrent workers, each with its own browser
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Skip a domain after this many failed tasks; 0 never skips
    #[arg(long, default_value_t = 10)]
    pub max_domain_failures: u32,

    /// Run the browser in headless mode
    #[arg(long)]
    pub headless: bool,

    /// Only use plain HTTP fetches, never launch a browser
    #[arg(long)]
    pub no_browser: bool,
}
