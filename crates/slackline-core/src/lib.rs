use std::path::PathBuf;

pub mod cache;
pub mod client;
pub mod config;
pub mod directory;
mod error;
mod history;
pub mod models;
pub mod pagination;
pub mod rtm;

pub use cache::DirectoryCache;
pub use client::SlackClient;
pub use config::SlacklineConfig;
pub use directory::UserDirectory;
pub use error::{ApiError, LookupKind};
pub use models::{HistoryResponse, Message};
pub use rtm::RtmListener;

pub use slackline_auth_bridge::{AuthBridge, AuthError, SlackAuth};

pub const DATA_DIR_ENV: &str = "SLACKLINE_DATA_DIR";

#[derive(Debug, Clone)]
pub struct SlacklinePaths {
    pub base_dir: PathBuf,
    pub cache_path: PathBuf,
}

impl SlacklinePaths {
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Self::from_base(PathBuf::from(dir));
        }
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
            return Self::from_base(PathBuf::from(xdg).join("slackline"));
        }
        if let Some(data) = dirs::data_dir() {
            return Self::from_base(data.join("slackline"));
        }
        Self::from_base(PathBuf::from(".slackline"))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let cache_path = base_dir.join("cache.json");
        Self {
            base_dir,
            cache_path,
        }
    }

    pub fn load_cache(&self) -> Result<DirectoryCache, ApiError> {
        DirectoryCache::load(&self.cache_path)
    }
}
