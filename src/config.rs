use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "meetup-digest.json";
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";
pub const DEFAULT_TEMPLATE: &str = "template.md";
pub const DEFAULT_OUTPUT: &str = "output.md";
pub const DEFAULT_TARGET_BRANCH: &str = "main";
pub const DEFAULT_BRANCH_PREFIX: &str = "update-events";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

const DEFAULT_GROUPS: [&str; 4] = [
    "https://www.meetup.com/space-coast-devs/",
    "https://www.meetup.com/spacecoastsec",
    "https://www.meetup.com/melbourne-makerspace-florida-usa/",
    "https://www.meetup.com/melbourne-rhug",
];

/// What to do when a single event page cannot be turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub groups: Vec<String>,
    pub template_dir: PathBuf,
    pub template: String,
    pub output: PathBuf,
    pub on_event_error: FailurePolicy,
    pub listing_fallbacks: bool,
    /// `YYYY-MM` or `MM`; unset keeps every event.
    pub month: Option<String>,
    pub deploy: DeployConfig,
}

/// Where `--deploy` publishes the digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    /// `https://github.com/<owner>/<repo>`; `ASTRO_REPO_URL` when unset.
    pub repo_url: Option<String>,
    pub target_branch: String,
    pub branch_prefix: String,
    /// Environment variable holding the API token. The token itself never
    /// lives in the config file.
    pub token_env: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            repo_url: None,
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            groups: DEFAULT_GROUPS.iter().map(|url| url.to_string()).collect(),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            template: DEFAULT_TEMPLATE.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            on_event_error: FailurePolicy::Abort,
            listing_fallbacks: false,
            month: None,
            deploy: DeployConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads the config file named on the command line, or the default file in
/// the working directory when it exists. Without either, defaults apply.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            read_config(path)
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_the_four_groups() {
        let config = AppConfig::default();
        assert_eq!(config.groups.len(), 4);
        assert_eq!(config.groups[0], "https://www.meetup.com/space-coast-devs/");
        assert_eq!(config.template_dir, PathBuf::from("templates"));
        assert_eq!(config.template, "template.md");
        assert_eq!(config.output, PathBuf::from("output.md"));
        assert_eq!(config.on_event_error, FailurePolicy::Abort);
        assert!(!config.listing_fallbacks);
        assert!(config.month.is_none());
        assert_eq!(config.deploy.target_branch, "main");
        assert_eq!(config.deploy.branch_prefix, "update-events");
        assert_eq!(config.deploy.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn deploy_section_overrides_only_what_it_names() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("digest.json");
        fs::write(
            &path,
            r#"{"deploy": {"repo_url": "https://github.com/spacecoastdevs/site", "target_branch": "trunk"}}"#,
        )
        .expect("write config");

        let config = load(Some(&path)).expect("load config");
        assert_eq!(
            config.deploy.repo_url.as_deref(),
            Some("https://github.com/spacecoastdevs/site")
        );
        assert_eq!(config.deploy.target_branch, "trunk");
        assert_eq!(config.deploy.branch_prefix, "update-events");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("digest.json");
        fs::write(
            &path,
            r#"{"groups": ["https://www.meetup.com/startupspacecoast/"], "on_event_error": "skip", "month": "2025-08"}"#,
        )
        .expect("write config");

        let config = load(Some(&path)).expect("load config");
        assert_eq!(
            config.groups,
            vec!["https://www.meetup.com/startupspacecoast/".to_string()]
        );
        assert_eq!(config.on_event_error, FailurePolicy::Skip);
        assert_eq!(config.month.as_deref(), Some("2025-08"));
        assert_eq!(config.output, PathBuf::from("output.md"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("digest.json");
        fs::write(&path, "{ groups: ").expect("write config");
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
