use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::base;
use super::{PageSource, ScrapeError};
use crate::models::EventRecord;

const SITE_SUFFIX: &str = " | Meetup";
const GROUP_LINK: &str = "a#event-group-link";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("event title selector"));
static GROUP_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(GROUP_LINK).expect("event group link selector"));
static DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".break-words").expect("event description selector"));

/// Title text split into the parts the digest shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTitle {
    pub title: String,
    pub date: String,
    pub time: String,
}

/// Why a single JSON-LD block did not yield a start date.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("no string startDate")]
    NoStartDate,
}

pub fn extract_event_data(source: &dyn PageSource, url: &str) -> Result<EventRecord, ScrapeError> {
    let meetup_name = meetup_name(url)?;
    let html = source.fetch(url)?;
    parse_event_page(url, meetup_name, &html)
}

/// Group slug from an address shaped like `https://host/<group>/events/<id>/`.
pub fn meetup_name(url: &str) -> Result<String, ScrapeError> {
    url.split('/')
        .nth(3)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::MalformedUrl {
            url: url.to_string(),
        })
}

pub fn parse_event_page(
    url: &str,
    meetup_name: String,
    html: &str,
) -> Result<EventRecord, ScrapeError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let raw_title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(base::element_text)
        .ok_or_else(|| ScrapeError::MissingElement {
            url: url.to_string(),
            element: "title",
        })?;
    let EventTitle { title, date, time } =
        parse_title(&raw_title).ok_or_else(|| ScrapeError::MalformedTitle {
            url: url.to_string(),
            title: clean_title(&raw_title),
        })?;

    let datetime = find_start_date(&document);

    let group_url = base::first_attr(&root, &GROUP_LINK_SELECTOR, "href").ok_or_else(|| {
        ScrapeError::MissingElement {
            url: url.to_string(),
            element: GROUP_LINK,
        }
    })?;

    let description = document
        .select(&DESCRIPTION_SELECTOR)
        .next()
        .map(|block| base::html_to_markdown(&block.html()));

    Ok(EventRecord {
        title,
        url: url.to_string(),
        date,
        time,
        group_url,
        meetup_name,
        description,
        datetime,
    })
}

pub fn clean_title(raw: &str) -> String {
    raw.replace(SITE_SUFFIX, "").trim().to_string()
}

/// Splits `Name, Group, Wed, May 1, 2024, 6:00 PM EDT` style titles.
///
/// The time is always the last comma part. The date is the `Mon D` part:
/// third from last when a year sits between it and the time, otherwise the
/// part just before the time. Titles with fewer than three parts are `None`.
pub fn parse_title(raw: &str) -> Option<EventTitle> {
    let title = clean_title(raw);
    let parts: Vec<&str> = title.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    let last = parts.len() - 1;
    let time = parts[last].to_string();
    let date_index = if is_year(parts[last - 1]) {
        last - 2
    } else {
        last - 1
    };
    let date = parts[date_index].to_string();

    Some(EventTitle { title, date, time })
}

fn is_year(part: &str) -> bool {
    part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit())
}

/// First `startDate` found across the page's JSON-LD blocks.
pub fn find_start_date(document: &Html) -> Option<String> {
    base::ld_json_blocks(document)
        .iter()
        .enumerate()
        .find_map(|(index, block)| match start_date_from_block(block) {
            Ok(start) => Some(start),
            Err(err) => {
                debug!(block = index, "skipping structured data block: {err}");
                None
            }
        })
}

pub fn start_date_from_block(text: &str) -> Result<String, MetadataError> {
    let value: Value = serde_json::from_str(text)?;
    let found = match &value {
        Value::Array(items) => items.iter().find_map(start_date_of),
        other => start_date_of(other),
    };
    found.ok_or(MetadataError::NoStartDate)
}

fn start_date_of(value: &Value) -> Option<String> {
    value
        .as_object()?
        .get("startDate")?
        .as_str()
        .map(str::to_string)
}
