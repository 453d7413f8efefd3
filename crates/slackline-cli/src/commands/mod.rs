pub mod api;
pub mod auth;
pub mod read;
pub mod send;

use anyhow::{anyhow, Context, Result};
use slackline_core::{ApiError, AuthError, SlackClient, SlacklinePaths};
use tracing::debug;

/// Flag value, else config value, else an error naming both.
pub(crate) fn require(flag: Option<String>, config: Option<&String>, what: &str) -> Result<String> {
    flag.or_else(|| config.cloned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "no {what} given: pass --{what} or set `{what}` in {}",
                config_hint()
            )
        })
}

fn config_hint() -> String {
    slackline_core::SlacklineConfig::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "the config file".to_string())
}

/// Recover the session for `team` and open a client over the local cache.
pub(crate) async fn connect(team: &str) -> Result<SlackClient> {
    let paths = SlacklinePaths::from_env();
    debug!("Using cache at {}", paths.cache_path.display());
    let cache = paths.load_cache().context("Failed to load directory cache")?;
    SlackClient::connect(team, cache)
        .await
        .with_context(|| format!("Failed to sign in to {}.slack.com", team))
}

/// Whether `err` means there is no desktop session to recover.
pub fn needs_desktop_login(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(auth) = cause.downcast_ref::<AuthError>() {
            return auth.needs_desktop_login();
        }
        matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Auth(auth)) if auth.needs_desktop_login())
    })
}
