use std::collections::HashMap;
use std::sync::OnceLock;

use regex::bytes::Regex;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use tracing::{info, instrument};

use crate::{AuthError, SlackAuth, SESSION_COOKIE};

fn api_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""api_token":"([^"]+)""#).expect("valid api_token regex"))
}

/// Trade the session cookie for the API token embedded in the team's web app.
#[instrument(skip(http_client, cookie))]
pub async fn exchange_for_token(
    http_client: &Client,
    team_url: &str,
    cookie: &str,
) -> Result<SlackAuth, AuthError> {
    let response = http_client
        .get(team_url)
        .header(COOKIE, format!("{}={}", SESSION_COOKIE, cookie))
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(AuthError::TokenExchangeStatus {
            url: team_url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await?;
    let token = scrape_api_token(&body).ok_or_else(|| AuthError::TokenNotFound {
        url: team_url.to_string(),
    })?;

    info!("Exchanged session cookie for API token (length: {})", token.len());
    Ok(SlackAuth {
        token,
        cookies: HashMap::from([(SESSION_COOKIE.to_string(), cookie.to_string())]),
    })
}

pub fn scrape_api_token(body: &[u8]) -> Option<String> {
    api_token_re()
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Parse `"<token>\n<name>=<url-escaped value>"`.
pub fn parse_env_auth(raw: &str) -> Result<SlackAuth, AuthError> {
    let (token, cookie) = raw
        .split_once('\n')
        .ok_or_else(|| AuthError::InvalidEnvAuth("missing newline after token".to_string()))?;
    let (name, value) = cookie
        .split_once('=')
        .ok_or_else(|| AuthError::InvalidEnvAuth("missing '=' in cookie".to_string()))?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidEnvAuth("empty token".to_string()));
    }

    let value = urlencoding::decode(value.trim_end())
        .map_err(|e| AuthError::InvalidEnvAuth(format!("failed to unescape cookie value: {}", e)))?;

    Ok(SlackAuth {
        token: token.to_string(),
        cookies: HashMap::from([(name.trim().to_string(), value.into_owned())]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_scrape_api_token() {
        let body = br#"<script>var boot_data = {"team_id":"T1","api_token":"xoxc-123-abc","other":1};</script>"#;
        assert_eq!(scrape_api_token(body).as_deref(), Some("xoxc-123-abc"));
        assert_eq!(scrape_api_token(b"<html>login</html>"), None);
    }

    #[test]
    fn test_parse_env_auth() {
        let auth = parse_env_auth("xoxc-token\nd=xoxd-abc%2Fdef%3D").unwrap();
        assert_eq!(auth.token, "xoxc-token");
        assert_eq!(auth.cookies.get("d").map(String::as_str), Some("xoxd-abc/def="));
    }

    #[test]
    fn test_parse_env_auth_rejects_malformed() {
        for raw in ["xoxc-token", "xoxc-token\nno-equals-sign", "\nd=value"] {
            assert!(
                matches!(parse_env_auth(raw), Err(AuthError::InvalidEnvAuth(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[tokio::test]
    async fn test_exchange_for_token() {
        let server = MockServer::start_async().await;
        let page = server
            .mock_async(|when, then| {
                when.method(GET).path("/").header("cookie", "d=xoxd-session");
                then.status(200)
                    .body(r#"<html>{"api_token":"xoxc-exchanged","x":1}</html>"#);
            })
            .await;

        let auth = exchange_for_token(&Client::new(), &server.url("/"), "xoxd-session")
            .await
            .unwrap();
        assert_eq!(auth.token, "xoxc-exchanged");
        assert_eq!(auth.cookies.get("d").map(String::as_str), Some("xoxd-session"));
        page.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_without_token_is_token_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).body("<html>please sign in</html>");
            })
            .await;

        let err = exchange_for_token(&Client::new(), &server.url("/"), "xoxd-session")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound { .. }));
    }

    #[tokio::test]
    async fn test_exchange_non_200_is_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(500);
            })
            .await;

        let err = exchange_for_token(&Client::new(), &server.url("/"), "xoxd-session")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeStatus { status: 500, .. }));
    }
}
