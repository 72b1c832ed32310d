use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.vitrine.market/api/";

/// Session tokens are minted elsewhere (login is a separate surface); the
/// client only asks for the current bearer token, if any.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<Option<String>>;
}

pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Result<Option<String>> {
        if self.token.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.token.clone()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: unauthorized")]
    Unauthorized,
    #[error("api: forbidden: {0}")]
    Forbidden(String),
    #[error("api: not found")]
    NotFound,
    #[error("api: rate limited")]
    RateLimited,
    #[error("api: request rejected: {0}")]
    Rejected(String),
    #[error("api: unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
    pub token_provider: Option<Arc<dyn TokenProvider>>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub author_id: Option<String>,
}

impl FeedQuery {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".into(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        if let Some(category) = self.category {
            params.push(("category".into(), category));
        }
        if let Some(author_id) = self.author_id {
            params.push(("author_id".into(), author_id));
        }
        params
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&ensure_trailing_slash(base))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            token_provider: config.token_provider,
        })
    }

    pub fn feed(&self, query: FeedQuery) -> Result<Vec<FeedItem>> {
        let params = query.into_params();
        let resp = self.request(Method::GET, "videos/feed", &params, None)?;
        let envelope: Envelope<Vec<FeedItem>> = resp.json()?;
        envelope.into_data()
    }

    pub fn item(&self, item_id: &str) -> Result<FeedItem> {
        let resp = self.request(Method::GET, &format!("videos/{item_id}"), &[], None)?;
        let envelope: Envelope<FeedItem> = resp.json()?;
        envelope.into_data()
    }

    pub fn toggle_like(&self, item_id: &str) -> Result<LikeUpdate> {
        let resp = self.request(Method::POST, &format!("videos/{item_id}/like"), &[], None)?;
        let envelope: Envelope<LikeUpdate> = resp.json()?;
        envelope.into_data()
    }

    pub fn set_bookmark(&self, item_id: &str, on: bool) -> Result<()> {
        let method = if on { Method::POST } else { Method::DELETE };
        let resp = self.request(method, &format!("videos/{item_id}/bookmark"), &[], None)?;
        let envelope: Envelope<Value> = resp.json()?;
        envelope.ack()
    }

    pub fn comments(&self, item_id: &str) -> Result<Vec<Comment>> {
        let resp = self.request(Method::GET, &format!("videos/{item_id}/comments"), &[], None)?;
        let envelope: Envelope<Vec<Comment>> = resp.json()?;
        envelope.into_data()
    }

    pub fn add_comment(
        &self,
        item_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment> {
        if content.trim().is_empty() {
            bail!("api: comment content is required");
        }
        let body = serde_json::json!({
            "content": content.trim(),
            "parent_id": parent_id,
        });
        let resp = self.request(
            Method::POST,
            &format!("videos/{item_id}/comment"),
            &[],
            Some(body),
        )?;
        let envelope: Envelope<Comment> = resp.json()?;
        envelope.into_data()
    }

    pub fn toggle_comment_like(&self, comment_id: &str) -> Result<CommentLikeUpdate> {
        let resp = self.request(
            Method::POST,
            &format!("videos/comments/{comment_id}/like"),
            &[],
            None,
        )?;
        let envelope: Envelope<CommentLikeUpdate> = resp.json()?;
        envelope.into_data()
    }

    pub fn record_view(&self, item_id: &str, metrics: &WatchMetrics) -> Result<()> {
        let body = serde_json::to_value(metrics).context("api: encode watch metrics")?;
        let resp = self.request(
            Method::POST,
            &format!("videos/{item_id}/view"),
            &[],
            Some(body),
        )?;
        let envelope: Envelope<Value> = resp.json()?;
        envelope.ack()
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Response> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            drop(pairs);
        }

        let mut req = self.http.request(method, url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(provider) = &self.token_provider {
            if let Some(token) = provider.token()? {
                req = req.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json");
            req = req.json(&body);
        }

        let resp = req.send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            let err = match status.as_u16() {
                401 => ApiError::Unauthorized,
                403 => ApiError::Forbidden(envelope_message(&body)),
                404 => ApiError::NotFound,
                429 => ApiError::RateLimited,
                code => ApiError::Status {
                    status: code,
                    body: envelope_message(&body),
                },
            };
            Err(anyhow!(err))
        }
    }
}

fn ensure_trailing_slash(mut base: String) -> String {
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

fn envelope_message(body: &str) -> String {
    serde_json::from_str::<Envelope<Value>>(body)
        .ok()
        .and_then(|env| env.message)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Every backend response is wrapped as `{success, data, message, timestamp}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    timestamp: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if !self.success {
            bail!(ApiError::Rejected(
                self.message.unwrap_or_else(|| "unknown error".into())
            ));
        }
        self.data
            .ok_or_else(|| anyhow!("api: response body missing data"))
    }

    fn ack(self) -> Result<()> {
        if !self.success {
            bail!(ApiError::Rejected(
                self.message.unwrap_or_else(|| "unknown error".into())
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub role: String,
}

impl Author {
    pub fn display_name(&self) -> &str {
        if !self.company_name.trim().is_empty() {
            self.company_name.trim()
        } else if !self.username.trim().is_empty() {
            self.username.trim()
        } else {
            "unknown"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "duration")]
    pub duration_secs: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub allow_comments: bool,
    #[serde(default)]
    pub author: Author,
    #[serde(default, alias = "likes")]
    pub likes_count: i64,
    #[serde(default, alias = "comment_count")]
    pub comments_count: i64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "user")]
    pub author: Author,
    #[serde(default, alias = "likes")]
    pub like_count: i64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeUpdate {
    #[serde(alias = "video_id")]
    pub item_id: String,
    #[serde(alias = "likes")]
    pub likes_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLikeUpdate {
    pub comment_id: String,
    #[serde(alias = "likes")]
    pub likes_count: i64,
    pub is_liked: bool,
}

/// Sent with every view record; both fields are zero at activation time and
/// the backend treats the event as a bare impression.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchMetrics {
    pub duration_watched: f64,
    pub completion_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_item_decodes_wire_aliases() {
        let raw = serde_json::json!({
            "id": "v-1",
            "title": "Oak dining table",
            "video_url": "https://cdn.test/v-1.mp4",
            "duration": 34.5,
            "likes": 12,
            "comment_count": 3,
            "author": {"id": "m-1", "username": "oak_works"}
        });
        let item: FeedItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.likes_count, 12);
        assert_eq!(item.comments_count, 3);
        assert!((item.duration_secs - 34.5).abs() < f64::EPSILON);
        assert!(item.allow_comments);
        assert!(!item.is_liked);
        assert_eq!(item.author.display_name(), "oak_works");
    }

    #[test]
    fn comment_decodes_nested_replies() {
        let raw = serde_json::json!({
            "id": "c-1",
            "content": "Beautiful grain",
            "user": {"id": "u-1", "username": "anna"},
            "likes": 2,
            "replies": [
                {"id": "c-2", "content": "Thanks!", "user": {"id": "m-1", "username": "oak_works"}}
            ]
        });
        let comment: Comment = serde_json::from_value(raw).unwrap();
        assert_eq!(comment.like_count, 2);
        assert_eq!(comment.replies.len(), 1);
        assert_eq!(comment.replies[0].author.username, "oak_works");
        assert!(comment.replies[0].replies.is_empty());
    }

    #[test]
    fn envelope_rejects_failed_responses() {
        let raw = r#"{"success": false, "message": "Video not found", "timestamp": "2026-01-01T00:00:00Z"}"#;
        let envelope: Envelope<FeedItem> = serde_json::from_str(raw).unwrap();
        let err = envelope.into_data().unwrap_err();
        assert!(err.to_string().contains("Video not found"));
    }

    #[test]
    fn watch_metrics_encode_camel_case() {
        let metrics = WatchMetrics {
            duration_watched: 4.0,
            completion_rate: 0.25,
        };
        let value = serde_json::to_value(metrics).unwrap();
        assert!(value.get("durationWatched").is_some());
        assert!(value.get("completionRate").is_some());
    }

    #[test]
    fn static_token_provider_skips_blank_tokens() {
        assert!(StaticTokenProvider::new("  ").token().unwrap().is_none());
        assert_eq!(
            StaticTokenProvider::new("abc").token().unwrap().as_deref(),
            Some("abc")
        );
    }
}
