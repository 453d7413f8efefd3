use tracing::{debug, instrument};

use crate::client::SlackClient;
use crate::models::HistoryResponse;
use crate::ApiError;

impl SlackClient {
    /// Messages starting at `anchor_ts`.
    ///
    /// If the anchor is the parent of a thread the whole thread is returned.
    /// Otherwise up to `limit` channel messages from the anchor onward.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        channel_id: &str,
        anchor_ts: &str,
        limit: usize,
    ) -> Result<HistoryResponse, ApiError> {
        let replies: HistoryResponse = self
            .get(
                "conversations.replies",
                &[
                    ("channel", channel_id.to_string()),
                    ("ts", anchor_ts.to_string()),
                    ("inclusive", "true".to_string()),
                ],
            )
            .await?;

        if replies.messages.len() > 1 {
            debug!("anchor is a thread with {} messages", replies.messages.len());
            return Ok(replies);
        }

        self.get(
            "conversations.history",
            &[
                ("channel", channel_id.to_string()),
                ("oldest", anchor_ts.to_string()),
                ("inclusive", "true".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}
