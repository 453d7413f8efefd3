//! Real Time Messaging listener used to wait for a reply after sending.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

use crate::client::SlackClient;
use crate::directory::UserDirectory;
use crate::models::{RtmConnectResponse, RtmEvent};
use crate::ApiError;

/// Overall deadline for one listen.
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RtmListener {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    timeout: Duration,
}

impl SlackClient {
    /// Open an RTM websocket for this session.
    pub async fn rtm_connect(&self) -> Result<RtmListener, ApiError> {
        let response: RtmConnectResponse = self.get("rtm.connect", &[]).await?;
        debug!("Connecting to RTM websocket");
        let (stream, _response) = connect_async(response.url.as_str())
            .await
            .map_err(|e| ApiError::Rtm(format!("websocket connect failed: {}", e)))?;

        Ok(RtmListener {
            stream,
            timeout: DEFAULT_LISTEN_TIMEOUT,
        })
    }
}

impl RtmListener {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for the first message in `channel_id` from `who` and return its
    /// text, attachment texts and file previews (blank parts dropped).
    ///
    /// `who` matches a bot profile name or username case-insensitively, or
    /// a user ID exactly. The socket is closed before returning on every path.
    #[instrument(skip(self, client))]
    pub async fn listen_for_message_from(
        mut self,
        client: &mut SlackClient,
        channel_id: &str,
        who: &str,
    ) -> Result<Vec<String>, ApiError> {
        let outcome = tokio::time::timeout(
            self.timeout,
            next_matching(&mut self.stream, client, channel_id, who),
        )
        .await;

        if let Err(e) = self.stream.close(None).await {
            debug!("RTM close: {}", e);
        }

        match outcome {
            Ok(result) => result.map(|event| message_parts(&event)),
            Err(_) => Err(ApiError::Rtm(format!(
                "no message from {:?} within {}s",
                who,
                self.timeout.as_secs()
            ))),
        }
    }
}

async fn next_matching(
    stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    client: &mut SlackClient,
    channel_id: &str,
    who: &str,
) -> Result<RtmEvent, ApiError> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| ApiError::Rtm(e.to_string()))?;
        let event: RtmEvent = match frame {
            WsMessage::Text(text) => serde_json::from_str(&text)
                .map_err(|e| ApiError::Rtm(format!("malformed event: {}", e)))?,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        if event.kind == "message"
            && event.channel == channel_id
            && is_from(client, &event, who).await
        {
            return Ok(event);
        }
    }

    Err(ApiError::Rtm("connection closed before a reply arrived".to_string()))
}

async fn is_from(client: &mut SlackClient, event: &RtmEvent, who: &str) -> bool {
    let bot_name = event.bot_profile.as_ref().map(|p| p.name.as_str());
    if bot_name.is_some_and(|name| name.eq_ignore_ascii_case(who)) || event.user == who {
        return true;
    }
    if event.user.is_empty() {
        return false;
    }

    // Outside collaborators can't be looked up by name, only by ID.
    match client.username_for_id(&event.user).await {
        Ok(name) => name.eq_ignore_ascii_case(who),
        Err(e) => {
            warn!("Could not resolve user {}: {}", event.user, e);
            false
        }
    }
}

fn message_parts(event: &RtmEvent) -> Vec<String> {
    std::iter::once(event.text.as_str())
        .chain(event.attachments.iter().map(|a| a.text.as_str()))
        .chain(event.files.iter().map(|f| f.preview.as_str()))
        .map(str::trim_end)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
