use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One scraped event, in the shape the digest template iterates over.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub title: String, // page title without the " | Meetup" suffix
    pub url: String,
    pub date: String,
    pub time: String,
    pub group_url: String,
    pub meetup_name: String,
    pub description: Option<String>,
    pub datetime: Option<String>, // startDate from the page's JSON-LD
}

impl EventRecord {
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.datetime
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
    }
}
