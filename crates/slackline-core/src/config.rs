//! User configuration.
//!
//! Read from `$SLACKLINE_CONFIG`, or `slackline/config.toml` under the
//! platform config directory. Every field is optional; command-line flags
//! take precedence over anything set here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_ENV: &str = "SLACKLINE_CONFIG";

/// Channel messages fetched after the anchor when reading.
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlacklineConfig {
    /// Slack workspace subdomain (`<team>.slack.com`).
    #[serde(default)]
    pub team: Option<String>,
    /// Default channel name for `send`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Bot to wait for after sending. A user ID is the most reliable match.
    #[serde(default)]
    pub bot: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for SlacklineConfig {
    fn default() -> Self {
        Self {
            team: None,
            channel: None,
            bot: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SlacklineConfig {
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("slackline").join("config.toml"))
    }

    /// Load the config at the default location, or defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SlacklineConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, SlacklineConfig::default());
        assert_eq!(config.limit, 20);
    }

    #[test]
    fn test_parse_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "team = \"acme\"\nchannel = \"ops\"\nbot = \"U0BOT\"\n").unwrap();

        let config = SlacklineConfig::load(&path).unwrap();
        assert_eq!(config.team.as_deref(), Some("acme"));
        assert_eq!(config.channel.as_deref(), Some("ops"));
        assert_eq!(config.bot.as_deref(), Some("U0BOT"));
        assert_eq!(config.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "limit = \"many\"").unwrap();

        let err = SlacklineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
