//! Scripted platform client and runtime builders for tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::client::{PlatformClient, SearchMode};
use super::oauth::TwitterCredentials;
use super::TwitterRuntime;
use crate::ai::MockCompletion;
use crate::config::{defaults, TwitterConfig};
use crate::db::Database;
use crate::ids;
use crate::models::{MediaItem, Post, Profile};

pub const OWN_USER_ID: &str = "1500";
pub const OWN_USERNAME: &str = "confi";

/// What the agent published through the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub text: String,
    pub reply_to: Option<String>,
    pub quoted: Option<String>,
    pub long: bool,
}

/// Scripted outcome for the n-th publish call
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    NoPost,
    Error(String),
}

#[derive(Default)]
struct State {
    posts: HashMap<String, Post>,
    failing_fetches: HashSet<String>,
    searches: HashMap<String, Result<Vec<Post>, String>>,
    search_log: Vec<String>,
    fetch_log: Vec<String>,
    profiles: HashMap<String, Profile>,
    followers: Vec<Profile>,
    following: Vec<Profile>,
    follows: Vec<String>,
    published: Vec<Published>,
    publish_calls: usize,
    publish_failures: HashMap<usize, PublishOutcome>,
    next_id: u64,
}

#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<State>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        let state = State {
            next_id: 1000,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn add_post(&self, post: Post) {
        self.state.lock().unwrap().posts.insert(post.id.clone(), post);
    }

    pub fn fail_fetch(&self, id: &str) {
        self.state.lock().unwrap().failing_fetches.insert(id.to_string());
    }

    pub fn set_search(&self, query: &str, result: Result<Vec<Post>, String>) {
        self.state
            .lock()
            .unwrap()
            .searches
            .insert(query.to_string(), result);
    }

    pub fn add_profile(&self, profile: Profile) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(profile.username.clone(), profile);
    }

    pub fn set_followers(&self, followers: Vec<Profile>) {
        self.state.lock().unwrap().followers = followers;
    }

    pub fn set_following(&self, following: Vec<Profile>) {
        self.state.lock().unwrap().following = following;
    }

    /// Make the publish call with this 0-based index fail
    pub fn fail_publish(&self, call_index: usize, outcome: PublishOutcome) {
        self.state
            .lock()
            .unwrap()
            .publish_failures
            .insert(call_index, outcome);
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn follows(&self) -> Vec<String> {
        self.state.lock().unwrap().follows.clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().search_log.clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    fn record_publish(
        &self,
        text: &str,
        reply_to: Option<&str>,
        quoted: Option<&str>,
        long: bool,
    ) -> Result<Option<Post>, String> {
        let mut state = self.state.lock().unwrap();
        let call = state.publish_calls;
        state.publish_calls += 1;

        match state.publish_failures.remove(&call) {
            Some(PublishOutcome::NoPost) => return Ok(None),
            Some(PublishOutcome::Error(e)) => return Err(e),
            None => {}
        }

        let id = state.next_id.to_string();
        state.next_id += 1;
        state.published.push(Published {
            text: text.to_string(),
            reply_to: reply_to.map(str::to_string),
            quoted: quoted.map(str::to_string),
            long,
        });

        let post = Post {
            permanent_url: Post::permalink(OWN_USERNAME, &id),
            author_id: OWN_USER_ID.to_string(),
            username: OWN_USERNAME.to_string(),
            name: OWN_USERNAME.to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            in_reply_to_id: reply_to.map(str::to_string),
            is_reply: reply_to.is_some(),
            id,
            ..Default::default()
        };
        state.posts.insert(post.id.clone(), post.clone());
        Ok(Some(post))
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn fetch_search_posts(
        &self,
        query: &str,
        limit: usize,
        _mode: SearchMode,
    ) -> Result<Vec<Post>, String> {
        let mut state = self.state.lock().unwrap();
        state.search_log.push(query.to_string());
        match state.searches.get(query) {
            Some(Ok(posts)) => Ok(posts.iter().take(limit).cloned().collect()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_post(&self, id: &str) -> Result<Option<Post>, String> {
        let mut state = self.state.lock().unwrap();
        state.fetch_log.push(id.to_string());
        if state.failing_fetches.contains(id) {
            return Err(format!("fetch {} failed", id));
        }
        Ok(state.posts.get(id).cloned())
    }

    async fn publish(
        &self,
        text: &str,
        reply_to: Option<&str>,
        _media: &[MediaItem],
    ) -> Result<Option<Post>, String> {
        self.record_publish(text, reply_to, None, false)
    }

    async fn publish_quote(&self, text: &str, quoted_id: &str) -> Result<Option<Post>, String> {
        self.record_publish(text, None, Some(quoted_id), false)
    }

    async fn publish_long(
        &self,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<Option<Post>, String> {
        self.record_publish(text, reply_to, None, true)
    }

    async fn fetch_profile(&self, username: &str) -> Result<Profile, String> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(username)
            .cloned()
            .ok_or_else(|| format!("no profile for {}", username))
    }

    async fn fetch_user_posts(&self, username: &str, limit: usize) -> Result<Vec<Post>, String> {
        self.fetch_search_posts(&format!("from:{}", username), limit, SearchMode::Latest)
            .await
    }

    async fn followers(&self, _user_id: &str, limit: usize) -> Result<Vec<Profile>, String> {
        Ok(self.state.lock().unwrap().followers.iter().take(limit).cloned().collect())
    }

    async fn following(&self, _user_id: &str, limit: usize) -> Result<Vec<Profile>, String> {
        Ok(self.state.lock().unwrap().following.iter().take(limit).cloned().collect())
    }

    async fn follow(&self, user_id: &str) -> Result<(), String> {
        self.state.lock().unwrap().follows.push(user_id.to_string());
        Ok(())
    }
}

pub fn test_config() -> TwitterConfig {
    TwitterConfig {
        username: OWN_USERNAME.to_string(),
        user_id: OWN_USER_ID.to_string(),
        credentials: TwitterCredentials::new(
            "ck".to_string(),
            "cs".to_string(),
            "at".to_string(),
            "ats".to_string(),
        ),
        dry_run: false,
        poll_interval_secs: defaults::POLL_INTERVAL_SECS,
        target_users: Vec::new(),
        quote_target_users: Vec::new(),
        summary_target_users: Vec::new(),
        max_thread_depth: defaults::MAX_THREAD_DEPTH,
        max_tweet_length: defaults::MAX_TWEET_LENGTH,
        chunk_delay_ms: (0, 0),
        quote_should_respond: false,
        summary_interval_min: defaults::SUMMARY_INTERVAL_MIN,
        summary_interval_max: defaults::SUMMARY_INTERVAL_MAX,
        post_immediately: false,
        enable_follow: false,
        confi_pump_hashtag: String::new(),
        confi_pump_url: String::new(),
    }
}

pub fn agent_id() -> Uuid {
    ids::string_to_uuid(OWN_USERNAME)
}

/// Runtime over an in-memory database and the given mocks
pub fn runtime_with(
    config: TwitterConfig,
    platform: &MockPlatform,
    ai: &MockCompletion,
) -> (TwitterRuntime, Arc<Database>) {
    let db = Arc::new(Database::new(":memory:").unwrap());
    let runtime = TwitterRuntime {
        agent_id: agent_id(),
        agent_name: OWN_USERNAME.to_string(),
        config: Arc::new(config),
        client: Arc::new(platform.clone()),
        store: db.clone(),
        ai: Arc::new(ai.clone()),
        mark_lock: Arc::new(tokio::sync::Mutex::new(())),
    };
    (runtime, db)
}

pub fn runtime(platform: &MockPlatform, ai: &MockCompletion) -> (TwitterRuntime, Arc<Database>) {
    runtime_with(test_config(), platform, ai)
}

/// A post by `username` (author id derived from the name) from a minute ago
pub fn post(id: &str, username: &str, text: &str, parent: Option<&str>) -> Post {
    Post {
        id: id.to_string(),
        author_id: format!("uid-{}", username),
        username: username.to_string(),
        name: username.to_string(),
        text: text.to_string(),
        timestamp: chrono::Utc::now().timestamp() - 60,
        conversation_id: "1".to_string(),
        in_reply_to_id: parent.map(str::to_string),
        is_reply: parent.is_some(),
        is_retweet: false,
        permanent_url: Post::permalink(username, id),
        photos: Vec::new(),
    }
}
