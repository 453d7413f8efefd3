//! Channel-name and user-ID resolution backed by the directory cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::client::SlackClient;
use crate::error::LookupKind;
use crate::models::{
    next_cursor, Channel, ConversationsResponse, Message, User, UsersInfoResponse, UsersResponse,
};
use crate::pagination::{list_all, Page};
use crate::ApiError;

/// Source of display names for user IDs.
#[async_trait]
pub trait UserDirectory: Send {
    async fn username_for_id(&mut self, id: &str) -> Result<String, ApiError>;

    /// Author label for a message: the user's name, `bot <id>` for bot
    /// posts, `ghost` when neither is set.
    async fn username_for_message(&mut self, message: &Message) -> Result<String, ApiError> {
        if let Some(user) = message.user.as_deref().filter(|u| !u.is_empty()) {
            return self.username_for_id(user).await;
        }
        if let Some(bot) = message.bot_id.as_deref().filter(|b| !b.is_empty()) {
            return Ok(format!("bot {}", bot));
        }
        Ok("ghost".to_string())
    }
}

impl SlackClient {
    /// All public, unarchived channels.
    pub async fn conversations(&self) -> Result<Vec<Channel>, ApiError> {
        list_all(|cursor| async move {
            let response: ConversationsResponse = self
                .get(
                    "conversations.list",
                    &[
                        ("cursor", cursor),
                        ("exclude_archived", "true".to_string()),
                        ("limit", "1000".to_string()),
                        ("types", "public_channel".to_string()),
                    ],
                )
                .await?;
            Ok::<_, ApiError>(Page {
                next_cursor: next_cursor(&response.response_metadata),
                items: response.channels,
            })
        })
        .await
    }

    /// Every member of the team.
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        list_all(|cursor| async move {
            let response: UsersResponse = self.get("users.list", &[("cursor", cursor)]).await?;
            Ok::<_, ApiError>(Page {
                next_cursor: next_cursor(&response.response_metadata),
                items: response.members,
            })
        })
        .await
    }

    /// Resolve a channel name to its ID or a user ID to its name.
    ///
    /// A cache miss triggers one full refresh of that kind's map. Users get
    /// a final `users.info` lookup; channels fail straight away.
    #[instrument(skip(self))]
    pub async fn resolve(&mut self, key: &str, kind: LookupKind) -> Result<String, ApiError> {
        if let Some(hit) = self.cached(key, kind) {
            return Ok(hit);
        }

        debug!("cache miss, refreshing");
        match kind {
            LookupKind::ChannelName => self.refresh_channels().await?,
            LookupKind::UserId => self.refresh_users().await?,
        }
        if let Some(hit) = self.cached(key, kind) {
            return Ok(hit);
        }

        match kind {
            LookupKind::ChannelName => Err(ApiError::NotFound {
                kind,
                key: key.to_string(),
            }),
            LookupKind::UserId => self.lookup_single_user(key).await,
        }
    }

    pub async fn channel_id_for_name(&mut self, name: &str) -> Result<String, ApiError> {
        self.resolve(name, LookupKind::ChannelName).await
    }

    fn cached(&self, key: &str, kind: LookupKind) -> Option<String> {
        let hit = match kind {
            LookupKind::ChannelName => self.cache.channel_id(key),
            LookupKind::UserId => self.cache.username(key),
        };
        hit.map(str::to_string)
    }

    async fn refresh_channels(&mut self) -> Result<(), ApiError> {
        let channels = self.conversations().await?;
        let mut map = HashMap::with_capacity(channels.len());
        for channel in channels {
            if !channel.is_channel {
                info!("Skipping non-channel {:?}", channel.name);
                continue;
            }
            map.insert(channel.name, channel.id);
        }

        info!("Cached {} channels", map.len());
        self.cache.replace_channels(map);
        self.cache.save()
    }

    async fn refresh_users(&mut self) -> Result<(), ApiError> {
        let map: HashMap<String, String> = self
            .users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        info!("Cached {} users", map.len());
        self.cache.replace_users(map);
        self.cache.save()
    }

    async fn lookup_single_user(&mut self, id: &str) -> Result<String, ApiError> {
        let response: UsersInfoResponse = match self
            .get("users.info", &[("user", id.to_string())])
            .await
        {
            Ok(response) => response,
            Err(err) if err.slack_error() == Some("user_not_found") => {
                return Err(ApiError::NotFound {
                    kind: LookupKind::UserId,
                    key: id.to_string(),
                })
            }
            Err(err) => return Err(err),
        };

        let name = response.user.name;
        self.cache.insert_user(id.to_string(), name.clone());
        self.cache.save()?;
        Ok(name)
    }
}

#[async_trait]
impl UserDirectory for SlackClient {
    async fn username_for_id(&mut self, id: &str) -> Result<String, ApiError> {
        self.resolve(id, LookupKind::UserId).await
    }
}
