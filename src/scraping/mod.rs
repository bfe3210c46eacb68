pub mod base;
pub mod event_page;
pub mod listing;

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, FailurePolicy};
use crate::models::EventRecord;

pub use base::HttpSource;

/// Anything that can hand back the HTML behind a URL.
pub trait PageSource {
    fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url}: required element `{element}` not found")]
    MissingElement { url: String, element: &'static str },
    #[error("{url}: expected an address shaped like https://host/<group>/...")]
    MalformedUrl { url: String },
    #[error("{url}: title {title:?} does not end in date and time parts")]
    MalformedTitle { url: String, title: String },
}

impl ScrapeError {
    pub fn url(&self) -> &str {
        match self {
            ScrapeError::Fetch { url, .. }
            | ScrapeError::MissingElement { url, .. }
            | ScrapeError::MalformedUrl { url }
            | ScrapeError::MalformedTitle { url, .. } => url,
        }
    }

    /// Errors that only cost the one event, whatever the failure policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScrapeError::MalformedTitle { .. })
    }
}

/// Walks every configured group listing and extracts each advertised event,
/// in group order and then listing order.
pub fn collect_events(
    config: &AppConfig,
    source: &dyn PageSource,
) -> anyhow::Result<Vec<EventRecord>> {
    let mut events = Vec::new();
    let mut skipped: Vec<ScrapeError> = Vec::new();

    for group_url in &config.groups {
        let html = source
            .fetch(group_url)
            .with_context(|| format!("unable to load group listing {group_url}"))?;
        let links = listing::discover_event_links(&html, group_url, config.listing_fallbacks);
        info!(group = %group_url, events = links.len(), "group listing scanned");

        for link in links {
            match event_page::extract_event_data(source, &link) {
                Ok(record) => {
                    info!("{} {}", record.meetup_name, record.title);
                    events.push(record);
                }
                Err(err)
                    if err.is_recoverable() || config.on_event_error == FailurePolicy::Skip =>
                {
                    warn!(url = %err.url(), "skipping event: {err}");
                    skipped.push(err);
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("event from {group_url} failed"));
                }
            }
        }
    }

    if events.is_empty() && !skipped.is_empty() {
        let joined = skipped
            .iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow::anyhow!("no events extracted: {joined}"));
    }

    Ok(events)
}
