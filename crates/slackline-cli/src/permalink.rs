use anyhow::{anyhow, bail, Context, Result};
use url::Url;

/// The pieces of a message permalink such as
/// `https://acme.slack.com/archives/C0123/p1700000000000100?thread_ts=1699999999.000200`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    pub team: String,
    pub channel_id: String,
    /// Message timestamp in `seconds.micros` form.
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl Permalink {
    pub fn parse(link: &str) -> Result<Self> {
        let url = Url::parse(link).with_context(|| format!("invalid permalink: {:?}", link))?;

        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("permalink has no host: {:?}", link))?;
        let team = host
            .strip_suffix(".slack.com")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("expected slack.com subdomain: {:?}", link))?;

        let segments: Vec<&str> = url.path().trim_start_matches('/').split('/').collect();
        let [archives, channel, message] = segments.as_slice() else {
            bail!("expected path of the form /archives/<channel>/p<timestamp>: {:?}", link);
        };
        if *archives != "archives" || channel.is_empty() {
            bail!("expected path of the form /archives/<channel>/p<timestamp>: {:?}", link);
        }

        let digits = message
            .strip_prefix('p')
            .filter(|d| d.len() > 6 && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| anyhow!("malformed message id {:?} in {:?}", message, link))?;
        let (secs, micros) = digits.split_at(digits.len() - 6);

        let thread_ts = url
            .query_pairs()
            .find(|(k, _)| k == "thread_ts")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty());

        Ok(Self {
            team: team.to_string(),
            channel_id: channel.to_string(),
            ts: format!("{}.{}", secs, micros),
            thread_ts,
        })
    }

    /// Where reading starts: the thread parent when the link points into a
    /// thread, otherwise the linked message itself.
    pub fn anchor(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}
