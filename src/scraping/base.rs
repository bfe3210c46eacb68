use std::time::Duration;

use htmd::{
    options::{BulletListMarker, Options},
    HtmlToMarkdown,
};
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{PageSource, ScrapeError};

/// One blocking client for every request the run makes.
pub(crate) static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("MeetupDigest/0.1 (+https://github.com/spacecoastdevs/meetup-digest)")
        .build()
        .expect("http client")
});

static LD_JSON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("ld+json selector")
});

pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href);
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(&href).ok().map(|u| u.to_string())
}

/// Raw contents of every `application/ld+json` script, in document order.
pub fn ld_json_blocks(document: &Html) -> Vec<String> {
    document
        .select(&LD_JSON_SELECTOR)
        .map(element_text)
        .collect()
}

/// Markdown rendering of an HTML fragment with `-` list bullets.
pub fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .options(Options {
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build();
    match converter.convert(html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(err) => {
            debug!(error = %err, "markdown conversion failed, using plain text");
            plain_text(html)
        }
    }
}

fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element()).trim().to_string()
}

pub fn fetch_html(url: &str) -> Result<String, ScrapeError> {
    let fail = |reason: String| ScrapeError::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = CLIENT
        .get(url)
        .send()
        .map_err(|err| fail(format!("request failed: {err}")))?;
    let response = response
        .error_for_status()
        .map_err(|err| fail(format!("non-success status: {err}")))?;
    response
        .text()
        .map_err(|err| fail(format!("unable to read response body: {err}")))
}

/// Live pages over HTTP, one blocking request at a time.
pub struct HttpSource;

impl PageSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        fetch_html(url)
    }
}
