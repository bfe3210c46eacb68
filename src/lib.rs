pub mod config;
pub mod deploy;
pub mod models;
pub mod render;
pub mod schedule;
pub mod scraping;
mod utils;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use tracing::info;

use config::AppConfig;
use deploy::{DeployPlan, GitHost, PullRequest};
use models::EventRecord;
use render::DigestInfo;
use schedule::MonthFilter;
use scraping::PageSource;

/// One full pass: scrape every group, order the events and write the digest.
/// Returns the number of events rendered.
pub fn run(config: &AppConfig, source: &dyn PageSource, today: NaiveDate) -> anyhow::Result<usize> {
    let month = requested_month(config, today)?;
    let events = gather(config, source, month)?;

    let digest = DigestInfo::new(month, today, events.len());
    render::render(
        &events,
        &config.template_dir,
        &config.template,
        &config.output,
        &digest,
    )
    .with_context(|| format!("unable to produce {}", config.output.display()))?;

    info!(
        events = events.len(),
        output = %config.output.display(),
        "digest written"
    );
    Ok(events.len())
}

#[derive(Debug)]
pub enum DeployOutcome {
    /// Nothing matched the month, so nothing was rendered or pushed.
    NoEvents,
    DryRun { plan: DeployPlan, document: String },
    Published { plan: DeployPlan, pull: PullRequest },
}

/// Renders the month's post and publishes it through `host`. Without a host
/// the post is rendered and planned but nothing leaves the machine.
///
/// Deploys always cover one month: the configured one, or the current month
/// on the site's clock.
pub fn deploy(
    config: &AppConfig,
    source: &dyn PageSource,
    host: Option<&dyn GitHost>,
    today: NaiveDate,
    target_file: Option<&str>,
) -> anyhow::Result<DeployOutcome> {
    let month = requested_month(config, today)?.unwrap_or_else(|| MonthFilter::containing(today));
    let events = gather(config, source, Some(month))?;
    if events.is_empty() {
        info!("no events for {}-{:02}, nothing to deploy", month.year, month.month);
        return Ok(DeployOutcome::NoEvents);
    }

    let digest = DigestInfo::new(Some(month), today, events.len());
    let document = render::render_to_string(&config.template_dir, &config.template, &events, &digest)
        .context("unable to render the post")?;
    let plan = DeployPlan::new(
        &config.deploy,
        month,
        today,
        target_file,
        &events,
        &config.groups,
    );
    info!(path = %plan.path, branch = %plan.branch, events = events.len(), "deploy planned");

    let host = match host {
        Some(host) => host,
        None => return Ok(DeployOutcome::DryRun { plan, document }),
    };
    let pull = deploy::publish(host, &plan, &document)
        .with_context(|| format!("unable to deploy {}", plan.path))?;
    info!(number = pull.number, url = %pull.html_url, "deployed");
    Ok(DeployOutcome::Published { plan, pull })
}

fn requested_month(config: &AppConfig, today: NaiveDate) -> anyhow::Result<Option<MonthFilter>> {
    let month = config
        .month
        .as_deref()
        .map(|text| MonthFilter::parse(text, today.year()))
        .transpose()?;
    Ok(month)
}

fn gather(
    config: &AppConfig,
    source: &dyn PageSource,
    month: Option<MonthFilter>,
) -> anyhow::Result<Vec<EventRecord>> {
    let events = scraping::collect_events(config, source)?;
    let collected = events.len();
    let events = prepare(events, month);
    if let Some(filter) = month {
        info!(
            collected,
            kept = events.len(),
            "filtered to {}-{:02}",
            filter.year,
            filter.month
        );
    }
    Ok(events)
}

fn prepare(events: Vec<EventRecord>, month: Option<MonthFilter>) -> Vec<EventRecord> {
    let events = match month {
        Some(filter) => schedule::filter_by_month(events, &filter),
        None => events,
    };
    schedule::sort_chronologically(events)
}
