//! Slack Web API payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

/// Continuation cursor of a list response; empty when there are no more pages.
pub(crate) fn next_cursor(meta: &Option<ResponseMetadata>) -> String {
    meta.as_ref()
        .map(|m| m.next_cursor.clone())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_channel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChannelInfoResponse {
    pub channel: Channel,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConversationsResponse {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UsersResponse {
    #[serde(default)]
    pub members: Vec<User>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UsersInfoResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

impl SendMessageResponse {
    pub fn permalink(&self, team: &str, channel_id: &str) -> String {
        format!(
            "https://{}.slack.com/archives/{}/p{}",
            team,
            channel_id,
            self.ts.replace('.', "")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RtmConnectResponse {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct File {
    #[serde(default)]
    pub preview: String,
}

/// One event from the RTM websocket. Only `message` events carry content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RtmEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub bot_id: String,
    /// Absent or `null` on messages from people.
    #[serde(default)]
    pub bot_profile: Option<BotProfile>,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub files: Vec<File>,
}
