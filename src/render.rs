use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use minijinja::{context, path_loader, Environment};
use serde::Serialize;
use thiserror::Error;

use crate::models::EventRecord;
use crate::schedule::MonthFilter;
use crate::utils;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {name:?} failed to render: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scalar facts about the digest, bound next to the event list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DigestInfo {
    pub publish_date: String,
    pub month_name: String,
    pub year: i32,
    pub event_count: usize,
}

impl DigestInfo {
    /// Titled after `month` when one was requested, otherwise after `today`.
    pub fn new(month: Option<MonthFilter>, today: NaiveDate, event_count: usize) -> Self {
        let month = month.unwrap_or_else(|| MonthFilter::containing(today));
        Self {
            publish_date: today.format("%Y-%m-%d").to_string(),
            month_name: month.month_name(),
            year: month.year,
            event_count,
        }
    }
}

/// Renders `template` from `template_dir` with the events bound as `posts`.
pub fn render_to_string(
    template_dir: &Path,
    template: &str,
    posts: &[EventRecord],
    digest: &DigestInfo,
) -> Result<String, RenderError> {
    let fail = |source: minijinja::Error| RenderError::Template {
        name: template.to_string(),
        source,
    };

    let mut env = Environment::new();
    env.set_loader(path_loader(template_dir));
    let tmpl = env.get_template(template).map_err(fail)?;
    tmpl.render(context! { posts => posts, digest => digest })
        .map_err(fail)
}

/// Renders the whole document before touching `output`, then swaps it in.
pub fn render(
    posts: &[EventRecord],
    template_dir: &Path,
    template: &str,
    output: &Path,
    digest: &DigestInfo,
) -> Result<(), RenderError> {
    let document = render_to_string(template_dir, template, posts, digest)?;
    utils::write_atomic(output, &document).map_err(|source| RenderError::Write {
        path: output.to_path_buf(),
        source,
    })
}
