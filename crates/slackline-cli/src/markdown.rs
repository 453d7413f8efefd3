//! Render Slack history as a Markdown block quote.

use std::fmt::Write as _;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;

use slackline_core::{HistoryResponse, UserDirectory};

fn user_mention() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<@[A-Z0-9]+>").expect("static regex"))
}

fn link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(https?://[^|>]+)\|([^>]+)>").expect("static regex"))
}

fn open_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```").expect("static regex"))
}

fn close_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(.)```$").expect("static regex"))
}

/// Replace `<@U123>` mentions with `` `@name` ``.
async fn interpolate_users<D>(directory: &mut D, text: &str) -> Result<String>
where
    D: UserDirectory + ?Sized,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in user_mention().find_iter(text) {
        let id = &text[found.start() + 2..found.end() - 1];
        let name = directory.username_for_id(id).await?;
        out.push_str(&text[last..found.start()]);
        out.push_str("`@");
        out.push_str(&name);
        out.push('`');
        last = found.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn rewrite_links(text: &str) -> String {
    link().replace_all(text, "[$2]($1)").into_owned()
}

/// Put code fences on lines of their own so the quote renders them.
fn split_code_fences(text: &str) -> String {
    let opened = open_fence().replace_all(text, "```\n");
    close_fence().replace_all(&opened, "$1\n```").into_owned()
}

async fn quote<D>(directory: &mut D, out: &mut String, text: &str) -> Result<()>
where
    D: UserDirectory + ?Sized,
{
    let text = interpolate_users(directory, text).await?;
    let text = split_code_fences(&rewrite_links(&text));
    for line in text.split('\n') {
        writeln!(out, "> {}", line)?;
    }
    Ok(())
}

fn parse_ts(ts: &str) -> Result<DateTime<Utc>> {
    let (secs, frac) = ts
        .split_once('.')
        .ok_or_else(|| anyhow!("timestamp {:?} is not in <seconds>.<micros> format", ts))?;
    let secs: i64 = secs
        .parse()
        .with_context(|| format!("bad seconds in timestamp {:?}", ts))?;
    let micros: u32 = frac
        .parse()
        .with_context(|| format!("bad fraction in timestamp {:?}", ts))?;
    DateTime::from_timestamp(secs, micros.saturating_mul(1000))
        .ok_or_else(|| anyhow!("timestamp {:?} is out of range", ts))
}

/// Messages oldest first, each as a quoted block headed by author and time.
pub async fn from_messages<D>(directory: &mut D, history: HistoryResponse) -> Result<String>
where
    D: UserDirectory + ?Sized,
{
    let mut messages = history
        .messages
        .into_iter()
        .map(|m| parse_ts(&m.ts).map(|at| (at, m)))
        .collect::<Result<Vec<_>>>()?;
    // History pages sometimes arrive newest first.
    messages.sort_by_key(|(at, _)| *at);

    let mut out = String::new();
    for (at, message) in &messages {
        let username = directory.username_for_message(message).await?;
        write!(out, "> **{}** at {}\n>\n", username, at.format("%Y-%m-%d %H:%M"))?;

        if !message.text.is_empty() {
            quote(directory, &mut out, &message.text).await?;
        }
        for attachment in &message.attachments {
            quote(directory, &mut out, &attachment.text).await?;
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn wrap_in_details(channel_name: &str, link: &str, body: &str) -> String {
    format!(
        "Slack conversation archive of [`#{}`]({})\n\n<details>\n  <summary>Click to expand</summary>\n\n{}\n</details>",
        channel_name, link, body
    )
}
