//! Platform client interface and its X API v2 implementation.
//!
//! Uses OAuth 1.0a user context for every call. All requests go through one
//! `RequestQueue` so the agent never has two calls in flight.

use super::oauth::{encode_query, generate_oauth_header, TwitterCredentials};
use super::request_queue::RequestQueue;
use crate::models::{MediaItem, Post, Profile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// Twitter API v2 base URL
const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Media upload still lives on the v1.1 upload host
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

/// Minimum gap between requests in the queue
const REQUEST_SPACING: Duration = Duration::from_millis(250);

const TWEET_FIELDS: &str =
    "author_id,conversation_id,created_at,in_reply_to_user_id,referenced_tweets,attachments";
const USER_FIELDS: &str = "username,name,created_at,public_metrics,verified_type";
const MEDIA_FIELDS: &str = "url,alt_text,type";
const EXPANSIONS: &str = "author_id,attachments.media_keys";

/// Ordering of search results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Latest,
    Top,
}

impl SearchMode {
    fn sort_order(&self) -> &'static str {
        match self {
            SearchMode::Latest => "recency",
            SearchMode::Top => "relevancy",
        }
    }
}

/// Operations the agent needs from the social platform.
///
/// Publishing returns `Ok(None)` when the platform accepted the call but did
/// not hand back a created post.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn fetch_search_posts(
        &self,
        query: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<Post>, String>;

    async fn fetch_post(&self, id: &str) -> Result<Option<Post>, String>;

    async fn publish(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaItem],
    ) -> Result<Option<Post>, String>;

    async fn publish_quote(&self, text: &str, quoted_id: &str) -> Result<Option<Post>, String>;

    /// Publish text beyond the normal length limit as a single post
    async fn publish_long(&self, text: &str, reply_to: Option<&str>)
        -> Result<Option<Post>, String>;

    async fn fetch_profile(&self, username: &str) -> Result<Profile, String>;

    async fn fetch_user_posts(&self, username: &str, limit: usize) -> Result<Vec<Post>, String>;

    async fn followers(&self, user_id: &str, limit: usize) -> Result<Vec<Profile>, String>;

    async fn following(&self, user_id: &str, limit: usize) -> Result<Vec<Profile>, String>;

    async fn follow(&self, user_id: &str) -> Result<(), String>;
}

#[derive(Debug, Deserialize)]
struct TwitterApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl TwitterApiError {
    fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    fn is_not_found(&self) -> bool {
        self.title.as_deref() == Some("Not Found Error")
    }
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    conversation_id: Option<String>,
    created_at: Option<String>,
    referenced_tweets: Option<Vec<ReferencedTweet>>,
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    ref_type: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    media_keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    name: String,
    created_at: Option<String>,
    public_metrics: Option<PublicMetrics>,
    verified_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiMedia {
    media_key: String,
    #[serde(rename = "type")]
    media_type: String,
    url: Option<String>,
    alt_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
    #[serde(default)]
    media: Vec<ApiMedia>,
}

#[derive(Debug, Deserialize)]
struct TweetListResponse {
    data: Option<Vec<ApiTweet>>,
    includes: Option<Includes>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct SingleTweetResponse {
    data: Option<ApiTweet>,
    includes: Option<Includes>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct SingleUserResponse {
    data: Option<ApiUser>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    data: Option<Vec<ApiUser>>,
    errors: Option<Vec<TwitterApiError>>,
}

/// Twitter API v2 tweet post response
#[derive(Debug, Deserialize)]
struct PostTweetResponse {
    data: Option<PostedTweet>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

fn join_errors(errors: &[TwitterApiError]) -> String {
    errors
        .iter()
        .map(|e| e.describe())
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_timestamp(raw: Option<&str>) -> i64 {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp())
}

fn user_to_profile(user: ApiUser) -> Profile {
    Profile {
        followers_count: user
            .public_metrics
            .as_ref()
            .map(|m| m.followers_count)
            .unwrap_or(0),
        joined: user
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp())
            .unwrap_or(0),
        is_blue_verified: user.verified_type.as_deref() == Some("blue"),
        id: user.id,
        username: user.username,
        name: user.name,
    }
}

/// Convert API tweets into posts, resolving authors and photos from `includes`
fn tweets_to_posts(tweets: Vec<ApiTweet>, includes: Option<Includes>) -> Vec<Post> {
    let includes = includes.unwrap_or_default();
    let users: HashMap<&str, &ApiUser> =
        includes.users.iter().map(|u| (u.id.as_str(), u)).collect();
    let media: HashMap<&str, &ApiMedia> = includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();

    tweets
        .into_iter()
        .map(|tweet| {
            let author_id = tweet.author_id.clone().unwrap_or_default();
            let (username, name) = users
                .get(author_id.as_str())
                .map(|u| (u.username.clone(), u.name.clone()))
                .unwrap_or_default();

            let refs = tweet.referenced_tweets.as_deref().unwrap_or(&[]);
            let in_reply_to_id = refs
                .iter()
                .find(|r| r.ref_type == "replied_to")
                .map(|r| r.id.clone());
            let is_retweet = refs.iter().any(|r| r.ref_type == "retweeted");

            let photos = tweet
                .attachments
                .as_ref()
                .and_then(|a| a.media_keys.as_ref())
                .map(|keys| {
                    keys.iter()
                        .filter_map(|k| media.get(k.as_str()))
                        .filter(|m| m.media_type == "photo")
                        .filter_map(|m| {
                            m.url.as_ref().map(|url| MediaItem {
                                id: m.media_key.clone(),
                                url: url.clone(),
                                alt_text: m.alt_text.clone(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            Post {
                permanent_url: Post::permalink(&username, &tweet.id),
                conversation_id: tweet.conversation_id.clone().unwrap_or_else(|| tweet.id.clone()),
                timestamp: parse_timestamp(tweet.created_at.as_deref()),
                is_reply: in_reply_to_id.is_some(),
                in_reply_to_id,
                is_retweet,
                photos,
                id: tweet.id,
                text: tweet.text,
                author_id,
                username,
                name,
            }
        })
        .collect()
}

/// X API v2 client using OAuth 1.0a user context
pub struct TwitterApiClient {
    http: reqwest::Client,
    credentials: TwitterCredentials,
    /// The agent's own account
    user_id: String,
    username: String,
    queue: RequestQueue,
}

impl TwitterApiClient {
    pub fn new(credentials: TwitterCredentials, user_id: String, username: String) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            credentials,
            user_id,
            username,
            queue: RequestQueue::new(REQUEST_SPACING),
        })
    }

    /// Validate credentials by fetching the authenticated user
    pub async fn verify_credentials(&self) -> Result<String, String> {
        let url = format!("{}/users/me", TWITTER_API_BASE);
        let body = self.get(&url, &[]).await?;
        let data: SingleUserResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;
        data.data
            .map(|u| u.username)
            .ok_or_else(|| "No user data returned".to_string())
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<String, String> {
        let full_url = if params.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, encode_query(params))
        };
        let auth_header = generate_oauth_header("GET", url, &self.credentials, Some(params));

        self.queue
            .add(|| async {
                let response = self
                    .http
                    .get(&full_url)
                    .header("Authorization", auth_header)
                    .send()
                    .await
                    .map_err(|e| format!("Request failed: {}", e))?;

                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                log::debug!("Twitter GET {} ({}): {}", url, status, body);

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(r#"{"errors":[{"title":"Not Found Error"}]}"#.to_string());
                }
                if !status.is_success() {
                    return Err(format!("API error ({}): {}", status, body));
                }
                Ok(body)
            })
            .await
    }

    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<String, String> {
        let auth_header = generate_oauth_header("POST", url, &self.credentials, None);

        self.queue
            .add(|| async {
                let response = self
                    .http
                    .post(url)
                    .header("Authorization", auth_header)
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| format!("Request failed: {}", e))?;

                let status = response.status();
                let response_body = response.text().await.unwrap_or_default();

                if !status.is_success() {
                    return Err(format!("API error ({}): {}", status, response_body));
                }
                Ok(response_body)
            })
            .await
    }

    async fn upload_media(&self, item: &MediaItem) -> Result<String, String> {
        let bytes = self
            .http
            .get(&item.url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch media {}: {}", item.url, e))?
            .error_for_status()
            .map_err(|e| format!("Failed to fetch media {}: {}", item.url, e))?
            .bytes()
            .await
            .map_err(|e| format!("Failed to read media {}: {}", item.url, e))?;

        let auth_header = generate_oauth_header("POST", MEDIA_UPLOAD_URL, &self.credentials, None);
        let form = Form::new().part("media", Part::bytes(bytes.to_vec()).file_name("media"));

        let body = self
            .queue
            .add(|| async {
                let response = self
                    .http
                    .post(MEDIA_UPLOAD_URL)
                    .header("Authorization", auth_header)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| format!("Media upload failed: {}", e))?;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    return Err(format!("Media upload error ({}): {}", status, body));
                }
                Ok(body)
            })
            .await?;

        let parsed: MediaUploadResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse media upload response: {}", e))?;
        Ok(parsed.media_id_string)
    }

    async fn create_tweet(&self, body: serde_json::Value, reply_to: Option<&str>) -> Result<Option<Post>, String> {
        let url = format!("{}/tweets", TWITTER_API_BASE);
        let response_body = self.post_json(&url, body).await?;

        let data: PostTweetResponse = serde_json::from_str(&response_body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if let Some(errors) = data.errors {
            return Err(format!("Twitter API errors: {}", join_errors(&errors)));
        }

        Ok(data.data.map(|tweet| {
            log::info!(
                "Twitter: Posted tweet {} - {}",
                tweet.id,
                tweet.text.chars().take(50).collect::<String>()
            );
            Post {
                permanent_url: Post::permalink(&self.username, &tweet.id),
                author_id: self.user_id.clone(),
                username: self.username.clone(),
                name: self.username.clone(),
                timestamp: Utc::now().timestamp(),
                conversation_id: String::new(),
                in_reply_to_id: reply_to.map(str::to_string),
                is_reply: reply_to.is_some(),
                is_retweet: false,
                photos: Vec::new(),
                id: tweet.id,
                text: tweet.text,
            }
        }))
    }

    async fn fetch_users(&self, url: &str, limit: usize) -> Result<Vec<Profile>, String> {
        let max_results = limit.clamp(1, 1000).to_string();
        let params = [("max_results", max_results.as_str()), ("user.fields", USER_FIELDS)];
        let body = self.get(url, &params).await?;
        let data: UserListResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;
        if let Some(errors) = data.errors {
            if data.data.is_none() {
                return Err(format!("Twitter API errors: {}", join_errors(&errors)));
            }
        }
        Ok(data.data.unwrap_or_default().into_iter().map(user_to_profile).collect())
    }
}

#[async_trait]
impl PlatformClient for TwitterApiClient {
    async fn fetch_search_posts(
        &self,
        query: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<Post>, String> {
        let url = format!("{}/tweets/search/recent", TWITTER_API_BASE);
        // The recent search endpoint accepts 10..=100 results per page
        let max_results = limit.clamp(10, 100).to_string();
        let params = [
            ("query", query),
            ("max_results", max_results.as_str()),
            ("sort_order", mode.sort_order()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", EXPANSIONS),
            ("user.fields", USER_FIELDS),
            ("media.fields", MEDIA_FIELDS),
        ];

        let body = self.get(&url, &params).await?;
        let data: TweetListResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if let Some(errors) = &data.errors {
            if data.data.is_none() {
                return Err(format!("Twitter API errors: {}", join_errors(errors)));
            }
        }

        let mut posts = tweets_to_posts(data.data.unwrap_or_default(), data.includes);
        posts.truncate(limit);
        Ok(posts)
    }

    async fn fetch_post(&self, id: &str) -> Result<Option<Post>, String> {
        let url = format!("{}/tweets/{}", TWITTER_API_BASE, id);
        let params = [
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", EXPANSIONS),
            ("user.fields", USER_FIELDS),
            ("media.fields", MEDIA_FIELDS),
        ];

        let body = self.get(&url, &params).await?;
        let data: SingleTweetResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        match (data.data, data.errors) {
            (Some(tweet), _) => Ok(tweets_to_posts(vec![tweet], data.includes).into_iter().next()),
            (None, Some(errors)) if errors.iter().any(|e| e.is_not_found()) => Ok(None),
            (None, Some(errors)) => Err(format!("Twitter API errors: {}", join_errors(&errors))),
            (None, None) => Ok(None),
        }
    }

    async fn publish(
        &self,
        text: &str,
        reply_to: Option<&str>,
        media: &[MediaItem],
    ) -> Result<Option<Post>, String> {
        let mut body = json!({ "text": text });

        if let Some(reply_to) = reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": reply_to });
        }

        if !media.is_empty() {
            let mut media_ids = Vec::with_capacity(media.len());
            for item in media {
                media_ids.push(self.upload_media(item).await?);
            }
            body["media"] = json!({ "media_ids": media_ids });
        }

        self.create_tweet(body, reply_to).await
    }

    async fn publish_quote(&self, text: &str, quoted_id: &str) -> Result<Option<Post>, String> {
        let body = json!({ "text": text, "quote_tweet_id": quoted_id });
        self.create_tweet(body, None).await
    }

    async fn publish_long(
        &self,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<Option<Post>, String> {
        // Long posts use the same endpoint; the account tier decides the limit
        self.publish(text, reply_to, &[]).await
    }

    async fn fetch_profile(&self, username: &str) -> Result<Profile, String> {
        let url = format!("{}/users/by/username/{}", TWITTER_API_BASE, username);
        let body = self.get(&url, &[("user.fields", USER_FIELDS)]).await?;
        let data: SingleUserResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        match (data.data, data.errors) {
            (Some(user), _) => Ok(user_to_profile(user)),
            (None, Some(errors)) => Err(format!("Twitter API errors: {}", join_errors(&errors))),
            (None, None) => Err(format!("No profile returned for @{}", username)),
        }
    }

    async fn fetch_user_posts(&self, username: &str, limit: usize) -> Result<Vec<Post>, String> {
        self.fetch_search_posts(&format!("from:{}", username), limit, SearchMode::Latest)
            .await
    }

    async fn followers(&self, user_id: &str, limit: usize) -> Result<Vec<Profile>, String> {
        let url = format!("{}/users/{}/followers", TWITTER_API_BASE, user_id);
        self.fetch_users(&url, limit).await
    }

    async fn following(&self, user_id: &str, limit: usize) -> Result<Vec<Profile>, String> {
        let url = format!("{}/users/{}/following", TWITTER_API_BASE, user_id);
        self.fetch_users(&url, limit).await
    }

    async fn follow(&self, user_id: &str) -> Result<(), String> {
        let url = format!("{}/users/{}/following", TWITTER_API_BASE, self.user_id);
        self.post_json(&url, json!({ "target_user_id": user_id }))
            .await
            .map(|_| ())
    }
}
