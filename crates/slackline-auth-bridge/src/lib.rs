//! Slack session recovery.
//!
//! Turns the cookie stored by the Slack desktop app into a [`SlackAuth`]:
//!
//! 1. fetch the cookie-protection key from the OS credential store
//! 2. read the `d` cookie from the app's Chromium cookie database
//! 3. decrypt it (skipped when the store holds it in plaintext)
//! 4. load the team's web app with that cookie and scrape the API token
//!
//! Headless environments can skip all of this by exporting `SLACK_AUTH`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::{info, instrument};

pub mod cookie_store;
pub mod decrypt;
mod error;
pub mod secret_store;
mod token;

pub use cookie_store::{read_encrypted_cookie, slack_config_dir, RawCookie};
pub use decrypt::CookieCipher;
pub use error::{AuthError, SecretReason};
pub use secret_store::{platform_secret_store, SecretStore};
pub use token::{exchange_for_token, parse_env_auth, scrape_api_token};

/// Environment variable carrying a pre-recovered `token\nname=value` pair.
pub const SLACK_AUTH_ENV: &str = "SLACK_AUTH";

/// Name of Slack's session cookie.
pub const SESSION_COOKIE: &str = "d";

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// API token plus the cookies it is bound to. Never written to disk.
#[derive(Clone, PartialEq, Eq)]
pub struct SlackAuth {
    pub token: String,
    pub cookies: HashMap<String, String>,
}

impl SlackAuth {
    pub fn from_env_value(raw: &str) -> Result<Self, AuthError> {
        parse_env_auth(raw)
    }
}

impl fmt::Debug for SlackAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackAuth")
            .field("token", &"<redacted>")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub fn team_url(team: &str) -> String {
    format!("https://{}.slack.com", team)
}

#[derive(Debug, Clone)]
pub struct AuthBridge {
    http_client: Client,
    slack_dir: Option<PathBuf>,
}

impl AuthBridge {
    pub fn new() -> Self {
        let http_client = Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            slack_dir: None,
        }
    }

    /// Use a specific Slack data directory instead of the platform default.
    pub fn with_slack_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.slack_dir = Some(dir.into());
        self
    }

    /// `SLACK_AUTH` when set, otherwise the desktop app's stored session.
    pub async fn recover_session(&self, team: &str) -> Result<SlackAuth, AuthError> {
        if let Some(raw) = std::env::var(SLACK_AUTH_ENV).ok().filter(|v| !v.is_empty()) {
            info!("Using Slack credentials from {}", SLACK_AUTH_ENV);
            return SlackAuth::from_env_value(&raw);
        }
        self.recover_from_desktop(&team_url(team)).await
    }

    #[instrument(skip(self))]
    pub async fn recover_from_desktop(&self, team_url: &str) -> Result<SlackAuth, AuthError> {
        let slack_dir = match &self.slack_dir {
            Some(dir) => dir.clone(),
            None => slack_config_dir()?,
        };
        let store = platform_secret_store(&slack_dir)?;
        let cookie = desktop_cookie(store.as_ref(), &slack_dir).await?;
        exchange_for_token(&self.http_client, team_url, &cookie).await
    }
}

impl Default for AuthBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the session cookie and decrypt it if the store holds it encrypted.
pub async fn desktop_cookie(store: &dyn SecretStore, slack_dir: &Path) -> Result<String, AuthError> {
    let db_path = cookie_store::cookie_db_path(slack_dir)?;
    let raw = read_encrypted_cookie(&db_path).await?;
    if raw.is_plaintext() {
        info!("Slack session cookie stored unencrypted");
        return Ok(raw.value);
    }

    let master_key = store.fetch_master_key()?;
    info!("Decrypting Slack session cookie using {} key", store.name());
    store.cipher().decrypt(&raw.encrypted_value, &master_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(Vec<u8>);

    impl SecretStore for FixedStore {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError> {
            Ok(self.0.clone())
        }

        fn iterations(&self) -> u32 {
            1
        }
    }

    struct EmptyStore;

    impl SecretStore for EmptyStore {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError> {
            Err(AuthError::SecretUnavailable {
                reason: SecretReason::Absent,
            })
        }

        fn iterations(&self) -> u32 {
            1
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = SlackAuth::from_env_value("xoxc-secret\nd=xoxd-secret").unwrap();
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("xoxc-secret"));
        assert!(!rendered.contains("xoxd-secret"));
    }

    #[test]
    fn test_team_url() {
        assert_eq!(team_url("acme"), "https://acme.slack.com");
    }

    #[tokio::test]
    async fn test_missing_slack_dir_is_cookie_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = desktop_cookie(&FixedStore(b"peanuts".to_vec()), &dir.path().join("Slack"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CookieNotFound { .. }));
    }

    /// Create a Chromium-style `Cookies` database holding one `d` cookie.
    async fn write_cookie_db(dir: &Path, value: &str, encrypted_value: &[u8]) {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite:")
            .unwrap()
            .filename(dir.join("Cookies"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE cookies (host_key TEXT, name TEXT, value TEXT, encrypted_value BLOB)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO cookies VALUES ('.slack.com', 'd', ?1, ?2)")
            .bind(value)
            .bind(encrypted_value.to_vec())
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_missing_secret_surfaces_after_cookie_read() {
        let dir = tempfile::tempdir().unwrap();
        write_cookie_db(dir.path(), "", b"v11ciphertext-0000").await;

        let err = desktop_cookie(&EmptyStore, dir.path()).await.unwrap_err();
        assert!(matches!(err, AuthError::SecretUnavailable { .. }));
        assert!(err.needs_desktop_login());
    }

    #[cfg(any(target_os = "macos", target_os = "linux", windows))]
    #[tokio::test]
    async fn test_recover_from_custom_slack_dir() {
        use httpmock::prelude::*;

        let dir = tempfile::tempdir().unwrap();
        write_cookie_db(dir.path(), "xoxd-plain", b"").await;

        let server = MockServer::start_async().await;
        let page = server
            .mock_async(|when, then| {
                when.method(GET).path("/").header("cookie", "d=xoxd-plain");
                then.status(200).body(r#"{"api_token":"xoxc-from-dir"}"#);
            })
            .await;

        let auth = AuthBridge::new()
            .with_slack_dir(dir.path())
            .recover_from_desktop(&server.url("/"))
            .await
            .unwrap();
        assert_eq!(auth.token, "xoxc-from-dir");
        page.assert_async().await;

        let err = AuthBridge::new()
            .with_slack_dir(dir.path().join("missing"))
            .recover_from_desktop(&server.url("/"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CookieNotFound { .. }));
    }
}
