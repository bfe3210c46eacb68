use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::base;

static ANCHOR_WITH_ID_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[id]").expect("listing anchor selector"));
static ANCHOR_WITH_HREF_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("listing href selector"));
static EVENT_CARD_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"event-card-e-[0-9]+").expect("event card id regex"));
static EVENT_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/events/[0-9]+").expect("event path regex"));

/// Every event-card link on a group listing page, in document order.
pub fn extract_all_events(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    event_cards(&document)
}

/// The first event-card link, or an empty string when the listing has none.
pub fn extract_first_event(html: &str) -> String {
    let document = Html::parse_document(html);
    event_cards(&document).into_iter().next().unwrap_or_default()
}

/// Event-card links, falling back to the listing's JSON-LD and then to plain
/// `/events/<id>` anchors when `fallbacks` is set and no card matched.
pub fn discover_event_links(html: &str, listing_url: &str, fallbacks: bool) -> Vec<String> {
    let document = Html::parse_document(html);
    let cards = event_cards(&document);
    if !cards.is_empty() || !fallbacks {
        return cards;
    }

    let from_metadata = structured_event_urls(&document);
    if !from_metadata.is_empty() {
        debug!(listing = listing_url, "event links taken from structured data");
        return from_metadata;
    }

    debug!(listing = listing_url, "event links taken from page anchors");
    event_path_links(&document, listing_url)
}

fn event_cards(document: &Html) -> Vec<String> {
    document
        .select(&ANCHOR_WITH_ID_SELECTOR)
        .filter(|anchor| {
            anchor
                .value()
                .id()
                .map_or(false, |id| EVENT_CARD_ID_RE.is_match(id))
        })
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::to_string)
        .collect()
}

fn structured_event_urls(document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for block in base::ld_json_blocks(document) {
        let items = match serde_json::from_str::<Value>(&block) {
            Ok(Value::Array(items)) => items,
            _ => continue,
        };
        for item in &items {
            if item.get("@type").and_then(Value::as_str) != Some("Event") {
                continue;
            }
            if let Some(url) = item.get("url").and_then(Value::as_str) {
                if seen.insert(url.to_string()) {
                    urls.push(url.to_string());
                }
            }
        }
    }

    urls
}

fn event_path_links(document: &Html, listing_url: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for anchor in document.select(&ANCHOR_WITH_HREF_SELECTOR) {
        let href = match anchor.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        if !href.contains("/events/")
            || href.contains("/events/past")
            || href.contains("/events/calendar")
        {
            continue;
        }
        let full = match base::absolute_url(listing_url, Some(href.to_string())) {
            Some(url) => url,
            None => continue,
        };
        if EVENT_PATH_RE.is_match(&full) && seen.insert(full.clone()) {
            urls.push(full);
        }
    }

    urls
}
