use anyhow::{Context, Result};
use slackline_auth_bridge::{AuthBridge, SlackAuth};

/// Shell `export` lines for the recovered session. The output is a live
/// credential.
pub fn export_lines(auth: &SlackAuth) -> String {
    let mut cookies: Vec<_> = auth.cookies.iter().collect();
    cookies.sort();
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(cookies)
        .finish();

    format!(
        "export SLACK_TOKEN={}\nexport SLACK_COOKIES={}\n",
        auth.token, encoded
    )
}

pub async fn run(team: &str) -> Result<()> {
    let auth = AuthBridge::new()
        .recover_session(team)
        .await
        .with_context(|| format!("Failed to recover a session for {}.slack.com", team))?;
    print!("{}", export_lines(&auth));
    Ok(())
}
