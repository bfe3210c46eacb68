use std::env;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::ACCEPT, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::models::EventRecord;
use crate::schedule::MonthFilter;
use crate::scraping::base::CLIENT;

pub const POST_DIR: &str = "src/content/post";
pub const REPO_URL_ENV: &str = "ASTRO_REPO_URL";

const API_ROOT: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

static REPO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([^/]+)/([^/\s]+?)(?:\.git)?/?$").expect("repo url regex")
});

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{0} is not set")]
    MissingSetting(String),
    #[error("repository url {0:?} does not name a GitHub owner and repository")]
    InvalidRepoUrl(String),
    #[error("base branch {0:?} does not exist")]
    MissingBranch(String),
    #[error("GitHub API {method} {endpoint} failed: {reason}")]
    Api {
        method: String,
        endpoint: String,
        reason: String,
    },
    #[error("{path} is unchanged on {branch} and no pull request is open")]
    NothingToDeploy { path: String, branch: String },
}

/// A file as it currently exists on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
}

/// The repository operations a deploy needs. `None` means "not found".
pub trait GitHost {
    fn branch_sha(&self, branch: &str) -> Result<Option<String>, DeployError>;
    fn create_branch(&self, branch: &str, sha: &str) -> Result<(), DeployError>;
    fn file(&self, path: &str, branch: &str) -> Result<Option<RemoteFile>, DeployError>;
    fn put_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<(), DeployError>;
    fn open_pull(&self, branch: &str) -> Result<Option<PullRequest>, DeployError>;
    fn create_pull(
        &self,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, DeployError>;
}

/// Everything a deploy decides before it talks to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub path: String,
    pub branch: String,
    pub base: String,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

impl DeployPlan {
    pub fn new(
        config: &DeployConfig,
        month: MonthFilter,
        today: NaiveDate,
        target_file: Option<&str>,
        events: &[EventRecord],
        groups: &[String],
    ) -> Self {
        let label = month_label(&month);
        Self {
            path: target_file
                .map(str::to_string)
                .unwrap_or_else(|| post_filename(&month, today)),
            branch: branch_name(&config.branch_prefix, &month),
            base: config.target_branch.clone(),
            commit_message: format!("Update events for {label}"),
            pr_title: format!("Update Space Coast Tech Events for {label}"),
            pr_body: pr_body(events, &label, today, groups),
        }
    }
}

fn month_label(month: &MonthFilter) -> String {
    format!("{}-{:02}", month.year, month.month)
}

/// `src/content/post/<today>-space-coast-tech-events-<month>-<year>.mdx`
pub fn post_filename(month: &MonthFilter, today: NaiveDate) -> String {
    format!(
        "{POST_DIR}/{}-space-coast-tech-events-{}-{}.mdx",
        today.format("%Y-%m-%d"),
        month.month_name().to_lowercase(),
        month.year
    )
}

pub fn branch_name(prefix: &str, month: &MonthFilter) -> String {
    format!("{prefix}-{}", month_label(month))
}

/// Pull request description: totals, per-group counts and the source groups.
pub fn pr_body(events: &[EventRecord], label: &str, today: NaiveDate, groups: &[String]) -> String {
    let mut per_group: Vec<(&str, usize)> = Vec::new();
    for event in events {
        match per_group
            .iter_mut()
            .find(|(name, _)| *name == event.meetup_name)
        {
            Some((_, count)) => *count += 1,
            None => per_group.push((event.meetup_name.as_str(), 1)),
        }
    }

    let mut body = format!(
        "## Automated event update for {label}\n\n\
         This PR updates the Space Coast tech events post.\n\n\
         ### Summary\n\
         - **Total Events**: {}\n\
         - **Period**: {label}\n\
         - **Generated**: {} ET\n\n\
         ### Events by Group\n",
        events.len(),
        today.format("%Y-%m-%d"),
    );
    for (name, count) in per_group {
        let plural = if count == 1 { "" } else { "s" };
        body.push_str(&format!("- **{name}**: {count} event{plural}\n"));
    }
    body.push_str("\n### Source Groups\n");
    for group in groups {
        body.push_str(&format!("- {group}\n"));
    }
    body.push_str("\nPlease review the content before merging.");
    body
}

/// Puts `document` at `plan.path` on the deploy branch and returns the pull
/// request that carries it, reusing an open one for the same branch.
pub fn publish(
    host: &dyn GitHost,
    plan: &DeployPlan,
    document: &str,
) -> Result<PullRequest, DeployError> {
    if host.branch_sha(&plan.branch)?.is_none() {
        let base = host
            .branch_sha(&plan.base)?
            .ok_or_else(|| DeployError::MissingBranch(plan.base.clone()))?;
        info!(branch = %plan.branch, base = %plan.base, "creating branch");
        host.create_branch(&plan.branch, &base)?;
    }

    let existing = host.file(&plan.path, &plan.branch)?;
    let changed = match &existing {
        Some(file) if file.content == document => {
            info!(path = %plan.path, "file already up to date");
            false
        }
        _ => {
            host.put_file(
                &plan.path,
                &plan.branch,
                document,
                &plan.commit_message,
                existing.as_ref().map(|file| file.sha.as_str()),
            )?;
            info!(path = %plan.path, branch = %plan.branch, "committed");
            true
        }
    };

    if let Some(pull) = host.open_pull(&plan.branch)? {
        info!(number = pull.number, url = %pull.html_url, "reusing open pull request");
        return Ok(pull);
    }
    if !changed {
        return Err(DeployError::NothingToDeploy {
            path: plan.path.clone(),
            branch: plan.branch.clone(),
        });
    }
    host.create_pull(&plan.branch, &plan.base, &plan.pr_title, &plan.pr_body)
}

/// GitHub REST client for one repository.
pub struct GitHubApi {
    owner: String,
    repo: String,
    token: String,
}

impl GitHubApi {
    pub fn new(repo_url: &str, token: String) -> Result<Self, DeployError> {
        let (owner, repo) = owner_and_repo(repo_url)?;
        Ok(Self { owner, repo, token })
    }

    /// Repository from the config or `ASTRO_REPO_URL`, token from the
    /// configured environment variable.
    pub fn from_env(config: &DeployConfig) -> Result<Self, DeployError> {
        let repo_url = match &config.repo_url {
            Some(url) => url.clone(),
            None => env::var(REPO_URL_ENV)
                .map_err(|_| DeployError::MissingSetting(REPO_URL_ENV.to_string()))?,
        };
        let token = env::var(&config.token_env)
            .map_err(|_| DeployError::MissingSetting(config.token_env.clone()))?;
        Self::new(&repo_url, token)
    }

    /// Sends one request. A 404 comes back as `Ok(None)`.
    fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, DeployError> {
        let fail = |reason: String| DeployError::Api {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            reason,
        };

        debug!("GitHub API: {method} {endpoint}");
        let url = format!("{API_ROOT}/repos/{}/{}{endpoint}", self.owner, self.repo);
        let mut request = CLIENT
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|err| fail(format!("request failed: {err}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response
            .text()
            .map_err(|err| fail(format!("unable to read response body: {err}")))?;
        if !status.is_success() {
            return Err(fail(format!("{status}: {}", api_message(&text))));
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| fail(format!("invalid JSON response: {err}")))
    }

    fn call_found(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, DeployError> {
        let name = method.to_string();
        self.call(method, endpoint, body)?
            .ok_or_else(|| DeployError::Api {
                method: name,
                endpoint: endpoint.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

impl GitHost for GitHubApi {
    fn branch_sha(&self, branch: &str) -> Result<Option<String>, DeployError> {
        let endpoint = format!("/git/refs/heads/{branch}");
        let found = self.call(Method::GET, &endpoint, None)?;
        Ok(found.and_then(|value| string_at(&value, "/object/sha")))
    }

    fn create_branch(&self, branch: &str, sha: &str) -> Result<(), DeployError> {
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        self.call_found(Method::POST, "/git/refs", Some(body))?;
        Ok(())
    }

    fn file(&self, path: &str, branch: &str) -> Result<Option<RemoteFile>, DeployError> {
        let endpoint = format!("/contents/{path}?ref={branch}");
        let value = match self.call(Method::GET, &endpoint, None)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let invalid = |reason: &str| DeployError::Api {
            method: Method::GET.to_string(),
            endpoint: endpoint.clone(),
            reason: reason.to_string(),
        };
        let sha = string_at(&value, "/sha").ok_or_else(|| invalid("not a file"))?;
        let encoded = string_at(&value, "/content").unwrap_or_default();
        let content = decode_content(&encoded).ok_or_else(|| invalid("undecodable content"))?;
        Ok(Some(RemoteFile { sha, content }))
    }

    fn put_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<(), DeployError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = Value::String(sha.to_string());
        }
        self.call_found(Method::PUT, &format!("/contents/{path}"), Some(body))?;
        Ok(())
    }

    fn open_pull(&self, branch: &str) -> Result<Option<PullRequest>, DeployError> {
        let endpoint = format!("/pulls?head={}:{branch}&state=open", self.owner);
        let pulls = self.call_found(Method::GET, &endpoint, None)?;
        let pulls: Vec<PullRequest> =
            serde_json::from_value(pulls).map_err(|err| DeployError::Api {
                method: Method::GET.to_string(),
                endpoint,
                reason: format!("unexpected pull request list: {err}"),
            })?;
        Ok(pulls.into_iter().next())
    }

    fn create_pull(
        &self,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, DeployError> {
        let request = json!({ "title": title, "head": branch, "base": base, "body": body });
        let created = self.call_found(Method::POST, "/pulls", Some(request))?;
        serde_json::from_value(created).map_err(|err| DeployError::Api {
            method: Method::POST.to_string(),
            endpoint: "/pulls".to_string(),
            reason: format!("unexpected pull request: {err}"),
        })
    }
}

pub fn owner_and_repo(repo_url: &str) -> Result<(String, String), DeployError> {
    let caps = REPO_URL_RE
        .captures(repo_url.trim())
        .ok_or_else(|| DeployError::InvalidRepoUrl(repo_url.to_string()))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer)?.as_str().map(str::to_string)
}

/// The contents API wraps base64 at 60 columns.
fn decode_content(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

fn api_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| string_at(&value, "/message"))
        .unwrap_or_else(|| text.trim().to_string())
}
