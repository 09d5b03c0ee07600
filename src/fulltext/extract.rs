//! Article extraction from publisher HTML.
//!
//! Metadata comes from the usual places (Open Graph and `article:` meta
//! tags, `<title>`, `<html lang>`, `<time datetime>`). The main text is the
//! paragraph text of the densest content container: `<article>` when present,
//! then common `main`/content wrappers, then the whole `<body>`. Paragraphs
//! shorter than a few words (bylines, share buttons, captions) are dropped.

use crate::models::{Article, FetchStrategy};
use crate::utils::domain_of;
use chrono::Utc;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

const MIN_PARAGRAPH_WORDS: usize = 5;

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "[itemprop='articleBody']",
        "main",
        "[role='main']",
        ".article-body",
        ".story-body",
        ".entry-content",
        ".post-content",
        "body",
    ]
    .iter()
    .map(|s| selector(s))
    .collect()
});
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static HTML_ROOT: Lazy<Selector> = Lazy::new(|| selector("html"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta[content]"));

fn clean(text: &str) -> String {
    text.split_whitespace().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    clean(&el.text().collect::<String>())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Meta tag content keyed by `property`, `name` or `itemprop`, lowercased.
fn meta_values<'a>(document: &'a Html, key: &str) -> impl Iterator<Item = String> + 'a {
    let key = key.to_lowercase();
    document.select(&META).filter_map(move |el| {
        let v = el.value();
        let matches = ["property", "name", "itemprop"].iter().any(|attr| {
            v.attr(attr)
                .map(|a| a.eq_ignore_ascii_case(&key))
                .unwrap_or(false)
        });
        if matches {
            v.attr("content").map(clean).and_then(non_empty)
        } else {
            None
        }
    })
}

fn first_meta(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| meta_values(document, key).next())
}

/// Paragraph text of the first content container that yields any.
fn main_text(document: &Html) -> Option<String> {
    CONTAINERS.iter().find_map(|container| {
        let paragraphs: Vec<String> = document
            .select(container)
            .flat_map(|c| c.select(&PARAGRAPH))
            .map(element_text)
            .filter(|p| p.split(' ').count() >= MIN_PARAGRAPH_WORDS)
            .unique()
            .collect();
        if paragraphs.is_empty() {
            None
        } else {
            Some(paragraphs.join("\n"))
        }
    })
}

/// Extract an [`Article`] from `html` fetched from `url`.
pub fn extract_article(html: &str, url: &str, fetched_with: FetchStrategy) -> Article {
    let document = Html::parse_document(html);

    let title_page = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .and_then(non_empty);
    let title = first_meta(&document, &["og:title", "twitter:title"])
        .or_else(|| document.select(&H1).next().map(element_text).and_then(non_empty))
        .or_else(|| title_page.clone());

    let authors: Vec<String> = meta_values(&document, "author")
        .chain(meta_values(&document, "article:author"))
        .unique()
        .collect();

    let date_publish = first_meta(
        &document,
        &[
            "article:published_time",
            "datePublished",
            "pubdate",
            "date",
            "dc.date",
        ],
    )
    .or_else(|| {
        document
            .select(&TIME)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(clean)
            .and_then(non_empty)
    });

    let language = document
        .select(&HTML_ROOT)
        .next()
        .and_then(|h| h.value().attr("lang"))
        .map(clean)
        .and_then(non_empty)
        .or_else(|| first_meta(&document, &["og:locale", "language"]));

    Article {
        url: url.to_string(),
        source_domain: domain_of(url),
        title,
        title_page,
        description: first_meta(&document, &["og:description", "description", "twitter:description"]),
        maintext: main_text(&document),
        authors,
        date_publish,
        date_download: Utc::now(),
        language,
        image_url: first_meta(&document, &["og:image", "twitter:image"]),
        fetched_with: Some(fetched_with),
    }
}
