use anyhow::{Context, Result};

use crate::ui;

pub async fn run(team: &str, channel: &str, message: &str, bot: Option<&str>) -> Result<()> {
    let mut client = super::connect(team).await?;

    let channel_id = client
        .channel_id_for_name(channel)
        .await
        .with_context(|| format!("Failed to find channel #{}", channel))?;

    // Connect before posting so a fast reply isn't missed.
    let listener = match bot {
        Some(_) => Some(client.rtm_connect().await.context("Failed to open RTM connection")?),
        None => None,
    };

    let sent = client
        .send_message(&channel_id, message)
        .await
        .context("Failed to send message")?;
    ui::success(&sent.permalink(team, &channel_id));

    if let (Some(listener), Some(bot)) = (listener, bot) {
        ui::info(&format!("Waiting for a reply from {}...", bot));
        let parts = listener
            .listen_for_message_from(&mut client, &channel_id, bot)
            .await
            .context("Failed to listen for messages")?;
        for part in parts {
            ui::reply(&part);
        }
    }

    Ok(())
}
