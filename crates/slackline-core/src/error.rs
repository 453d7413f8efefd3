use std::fmt;
use std::path::PathBuf;

use slackline_auth_bridge::AuthError;

/// What a directory lookup was resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// Channel name to channel ID.
    ChannelName,
    /// User ID to username.
    UserId,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::ChannelName => write!(f, "channel with name"),
            LookupKind::UserId => write!(f, "user with id"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("status code {status}, body: {body:?}")]
    Status { status: u16, body: String },

    #[error("{method} response not OK: {body}")]
    NotOk {
        method: String,
        error: Option<String>,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid Retry-After header on 429 response: {0:?}")]
    InvalidRetryAfter(Option<String>),

    #[error("failed to encode {method} request: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not find any {kind} {key:?}")]
    NotFound { kind: LookupKind, key: String },

    #[error("cache error at {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rtm: {0}")]
    Rtm(String),
}

impl ApiError {
    pub(crate) fn cache(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        ApiError::Cache {
            path: path.into(),
            source: source.into(),
        }
    }

    /// The Slack `error` code of a not-OK response, if any.
    pub fn slack_error(&self) -> Option<&str> {
        match self {
            ApiError::NotOk { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}
