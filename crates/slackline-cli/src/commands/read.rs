use anyhow::{Context, Result};
use tracing::info;

use crate::markdown;
use crate::permalink::Permalink;

pub async fn run(link: &str, limit: usize, details: bool) -> Result<()> {
    let permalink = Permalink::parse(link)?;
    let mut client = super::connect(&permalink.team).await?;

    info!(
        "Reading {} from {} (limit {})",
        permalink.channel_id,
        permalink.anchor(),
        limit
    );
    let history = client
        .history(&permalink.channel_id, permalink.anchor(), limit)
        .await
        .context("Failed to fetch messages")?;

    let mut output = markdown::from_messages(&mut client, history).await?;
    if details {
        let channel = client
            .channel_info(&permalink.channel_id)
            .await
            .context("Failed to look up channel name")?;
        output = markdown::wrap_in_details(&channel.name, link, &output);
    }

    print!("{}", output);
    Ok(())
}
