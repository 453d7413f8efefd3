//! Authenticated Slack Web API client.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use slackline_auth_bridge::{team_url, AuthBridge, SlackAuth};

use crate::cache::DirectoryCache;
use crate::models::{Channel, ChannelInfoResponse, SendMessage, SendMessageResponse};
use crate::ApiError;

/// Session-bound client for one team. Owns the credential and the
/// directory cache; every call goes through [`SlackClient::call`].
pub struct SlackClient {
    team: String,
    base_url: String,
    auth: SlackAuth,
    cookie_header: String,
    http_client: reqwest::Client,
    pub(crate) cache: DirectoryCache,
}

#[derive(Debug, Deserialize)]
struct OkFlag {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackClient {
    pub fn new(team: &str, auth: SlackAuth, cache: DirectoryCache) -> Self {
        let mut cookies: Vec<_> = auth.cookies.iter().collect();
        cookies.sort();
        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            team: team.to_string(),
            base_url: team_url(team),
            auth,
            cookie_header,
            http_client: reqwest::Client::new(),
            cache,
        }
    }

    /// Recover the session for `team` (desktop app or `SLACK_AUTH`) and
    /// build a client around it.
    pub async fn connect(team: &str, cache: DirectoryCache) -> Result<Self, ApiError> {
        let auth = AuthBridge::new().recover_session(team).await?;
        Ok(Self::new(team, auth, cache))
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn auth(&self) -> &SlackAuth {
        &self.auth
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Issue one API call, sleeping out 429s for as long as the server asks.
    ///
    /// The retry loop has no cap. Any other status of 300 or above fails
    /// with the response body attached.
    #[instrument(skip(self, query, body), fields(team = %self.team))]
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/api/{}", self.base_url, path);

        loop {
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .query(query)
                .bearer_auth(&self.auth.token);
            if !self.cookie_header.is_empty() {
                request = request.header(COOKIE, &self.cookie_header);
            }
            if let Some(body) = body {
                request = request
                    .header(CONTENT_TYPE, "application/json; charset=utf-8")
                    .body(body.to_vec());
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(response.headers().get(RETRY_AFTER))?;
                warn!("rate limited, waiting {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
                continue;
            }

            let bytes = response.bytes().await?;
            if status.as_u16() >= 300 {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }

            debug!("{} {} -> {} ({} bytes)", method, path, status, bytes.len());
            return Ok(bytes.to_vec());
        }
    }

    /// GET `method` and decode it, requiring `"ok": true`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let body = self.call(Method::GET, method, query, None).await?;
        decode_ok(method, &body)
    }

    /// POST a JSON body to `method` and decode it, requiring `"ok": true`.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &B,
    ) -> Result<T, ApiError> {
        let json = serde_json::to_vec(payload).map_err(|e| ApiError::Encode {
            method: method.to_string(),
            source: e,
        })?;
        let body = self.call(Method::POST, method, &[], Some(&json)).await?;
        decode_ok(method, &body)
    }

    pub async fn channel_info(&self, channel_id: &str) -> Result<Channel, ApiError> {
        let response: ChannelInfoResponse = self
            .get("conversations.info", &[("channel", channel_id.to_string())])
            .await?;
        Ok(response.channel)
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let message = SendMessage {
            channel: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: None,
            attachments: Vec::new(),
        };
        let response: SendMessageResponse = self.post_json("chat.postMessage", &message).await?;
        if let Some(warning) = &response.warning {
            warn!("chat.postMessage warning: {}", warning);
        }
        Ok(response)
    }
}

fn retry_after(header: Option<&HeaderValue>) -> Result<Duration, ApiError> {
    let raw = header.and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string());
    match raw.as_deref().map(str::parse::<u64>) {
        Some(Ok(secs)) => Ok(Duration::from_secs(secs)),
        _ => Err(ApiError::InvalidRetryAfter(raw)),
    }
}

/// Decode a successful response, treating `"ok": false` as a failure that
/// carries the raw body.
pub(crate) fn decode_ok<T: DeserializeOwned>(method: &str, body: &[u8]) -> Result<T, ApiError> {
    let flag: OkFlag = serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        method: method.to_string(),
        source: e,
    })?;
    if !flag.ok {
        return Err(ApiError::NotOk {
            method: method.to_string(),
            error: flag.error,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        method: method.to_string(),
        source: e,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Instant;

    pub(crate) fn test_client(server: &MockServer, dir: &Path) -> SlackClient {
        let auth = SlackAuth {
            token: "xoxc-test".to_string(),
            cookies: HashMap::from([("d".to_string(), "xoxd-test".to_string())]),
        };
        let cache = DirectoryCache::load(dir.join("cache.json")).unwrap();
        SlackClient::new("test", auth, cache).with_base_url(server.base_url())
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(
            retry_after(Some(&HeaderValue::from_static("3"))).unwrap(),
            Duration::from_secs(3)
        );
        assert!(matches!(
            retry_after(Some(&HeaderValue::from_static("soon"))),
            Err(ApiError::InvalidRetryAfter(Some(_)))
        ));
        assert!(matches!(
            retry_after(None),
            Err(ApiError::InvalidRetryAfter(None))
        ));
    }

    #[test]
    fn test_decode_ok_false_keeps_body() {
        let body = br#"{"ok":false,"error":"channel_not_found"}"#;
        let err = decode_ok::<serde_json::Value>("conversations.info", body).unwrap_err();
        assert_eq!(err.slack_error(), Some("channel_not_found"));
        match err {
            ApiError::NotOk { body, .. } => assert!(body.contains("channel_not_found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_call_sends_token_and_cookies() {
        let server = MockServer::start_async().await;
        let info = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/conversations.info")
                    .query_param("channel", "C1")
                    .header("authorization", "Bearer xoxc-test")
                    .header("cookie", "d=xoxd-test");
                then.status(200).json_body(json!({
                    "ok": true,
                    "channel": {"id": "C1", "name": "general", "is_channel": true}
                }));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        let channel = client.channel_info("C1").await.unwrap();

        assert_eq!(channel.name, "general");
        info.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rate_limited_call_waits_and_retries() {
        let server = MockServer::start_async().await;
        let mut limited = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/conversations.info");
                then.status(429).header("Retry-After", "1");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        let started = Instant::now();
        let call = tokio::spawn(async move {
            client
                .call(
                    Method::GET,
                    "conversations.info",
                    &[("channel", "C1".to_string())],
                    None,
                )
                .await
        });

        // Swap the 429 for a 200 while the client sleeps out Retry-After.
        while limited.calls_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        limited.delete_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/conversations.info");
                then.status(200).body(r#"{"ok":true,"channel":{"id":"C1"}}"#);
            })
            .await;

        let body = call.await.unwrap().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(body, br#"{"ok":true,"channel":{"id":"C1"}}"#.to_vec());
        assert!(elapsed >= Duration::from_secs(1), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "returned after {:?}", elapsed);
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_fails_without_retry() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/users.list");
                then.status(500).body("upstream exploded");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        let err = client
            .call(Method::GET, "users.list", &[], None)
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(failing.calls_async().await, 1);
    }

    #[tokio::test]
    async fn test_ok_false_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/conversations.info");
                then.status(200)
                    .json_body(json!({"ok": false, "error": "channel_not_found"}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        let err = client.channel_info("C404").await.unwrap_err();
        assert_eq!(err.slack_error(), Some("channel_not_found"));
    }

    #[tokio::test]
    async fn test_send_message_posts_json() {
        let server = MockServer::start_async().await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat.postMessage")
                    .header("content-type", "application/json; charset=utf-8")
                    .json_body(json!({"channel": "C1", "text": "hello"}));
                then.status(200)
                    .json_body(json!({"ok": true, "channel": "C1", "ts": "1700000000.000100"}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        let response = client.send_message("C1", "hello").await.unwrap();

        assert_eq!(
            response.permalink("test", "C1"),
            "https://test.slack.com/archives/C1/p1700000000000100"
        );
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_unserializable_payload_is_encode_error() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(&server, dir.path());
        // JSON object keys must be strings.
        let payload = HashMap::from([((1u8, 2u8), 3u8)]);
        let err = client
            .post_json::<_, serde_json::Value>("chat.postMessage", &payload)
            .await
            .unwrap_err();

        match err {
            ApiError::Encode { method, .. } => assert_eq!(method, "chat.postMessage"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(any.calls_async().await, 0);
    }
}
