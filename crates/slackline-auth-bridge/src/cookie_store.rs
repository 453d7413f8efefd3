//! Read access to the desktop client's Chromium cookie database.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, instrument};

use crate::AuthError;

const COOKIE_QUERY: &str =
    "SELECT value, encrypted_value FROM cookies WHERE host_key = '.slack.com' AND name = 'd'";

/// The `d` cookie as stored: older stores keep it in `value`, newer ones
/// leave that empty and fill `encrypted_value`.
#[derive(Clone, PartialEq, Eq)]
pub struct RawCookie {
    pub value: String,
    pub encrypted_value: Vec<u8>,
}

impl RawCookie {
    pub fn is_plaintext(&self) -> bool {
        !self.value.is_empty()
    }
}

impl std::fmt::Debug for RawCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCookie")
            .field("value_len", &self.value.len())
            .field("encrypted_len", &self.encrypted_value.len())
            .finish()
    }
}

/// Locate the Slack desktop client's data directory.
pub fn slack_config_dir() -> Result<PathBuf, AuthError> {
    #[cfg(windows)]
    {
        let appdata = std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .ok_or(AuthError::UnsupportedPlatform("windows without APPDATA"))?;
        Ok(appdata.join("Slack"))
    }
    #[cfg(target_os = "macos")]
    {
        let home = dirs::home_dir().ok_or(AuthError::UnsupportedPlatform("macos without HOME"))?;
        let direct = home.join("Library").join("Application Support").join("Slack");
        if direct.exists() {
            return Ok(direct);
        }
        Ok(home
            .join("Library")
            .join("Containers")
            .join("com.tinyspeck.slackmacgap")
            .join("Data")
            .join("Library")
            .join("Application Support")
            .join("Slack"))
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir).join("Slack"));
        }
        let home = dirs::home_dir().ok_or(AuthError::UnsupportedPlatform("linux without HOME"))?;
        Ok(home.join(".config").join("Slack"))
    }
    #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
    {
        Err(AuthError::UnsupportedPlatform(std::env::consts::OS))
    }
}

/// Cookie database inside the Slack directory. Newer Chromium builds keep it
/// under `Network/`.
pub fn cookie_db_path(slack_dir: &Path) -> Result<PathBuf, AuthError> {
    if !slack_dir.is_dir() {
        return Err(AuthError::CookieNotFound {
            path: slack_dir.to_path_buf(),
        });
    }

    let network = slack_dir.join("Network").join("Cookies");
    if network.is_file() {
        return Ok(network);
    }
    Ok(slack_dir.join("Cookies"))
}

/// Fetch the first `d` cookie row for `.slack.com`.
#[instrument(skip_all, fields(path = %store_path.display()))]
pub async fn read_encrypted_cookie(store_path: &Path) -> Result<RawCookie, AuthError> {
    if !store_path.is_file() {
        return Err(AuthError::CookieNotFound {
            path: store_path.to_path_buf(),
        });
    }

    let options = SqliteConnectOptions::from_str("sqlite:")?
        .filename(store_path)
        .read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let row = sqlx::query_as::<_, (String, Vec<u8>)>(COOKIE_QUERY)
        .fetch_optional(&pool)
        .await;
    pool.close().await;

    match row? {
        Some((value, encrypted_value)) => {
            let cookie = RawCookie {
                value,
                encrypted_value,
            };
            debug!(?cookie, "Read Slack session cookie row");
            Ok(cookie)
        }
        None => Err(AuthError::CookieNotFound {
            path: store_path.to_path_buf(),
        }),
    }
}
