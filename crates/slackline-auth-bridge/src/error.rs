use std::fmt;
use std::path::PathBuf;

/// Why the OS credential store could not hand over the Slack master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretReason {
    /// No matching item (or every keychain candidate failed).
    Absent,
    /// More than one unlocked item matched the search attributes.
    Ambiguous(usize),
    /// The backend itself failed (tool missing, unsupported platform, ...).
    Backend(String),
}

impl fmt::Display for SecretReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretReason::Absent => write!(f, "no matching item found"),
            SecretReason::Ambiguous(count) => write!(f, "{} matching items found", count),
            SecretReason::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to get cookie password from the OS credential store: {reason}")]
    SecretUnavailable { reason: SecretReason },

    #[error("encryption method {0:?} is not supported")]
    UnsupportedEncryption(String),

    #[error("no Slack session cookie found in {}", path.display())]
    CookieNotFound { path: PathBuf },

    #[error("failed to query Slack cookie store: {0}")]
    CookieStore(#[from] sqlx::Error),

    #[error("failed to decrypt Slack session cookie: {0}")]
    DecryptionFailed(String),

    #[error("api token not found in response from {url}")]
    TokenNotFound { url: String },

    #[error("token exchange with {url} failed with status code {status}")]
    TokenExchangeStatus { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(
        "environment variable SLACK_AUTH not in expected format ({0}). \
         Expected \"<token>\\n<cookie-name>=<url-escaped cookie value>\""
    )]
    InvalidEnvAuth(String),

    #[error("unsupported platform {0:?}")]
    UnsupportedPlatform(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AuthError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AuthError::Io {
            context: context.into(),
            source,
        }
    }

    /// True when the fix is to (re)log into the Slack desktop app.
    pub fn needs_desktop_login(&self) -> bool {
        matches!(
            self,
            AuthError::CookieNotFound { .. } | AuthError::SecretUnavailable { .. }
        )
    }
}
