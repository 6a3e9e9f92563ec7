//! Periodic summary posts built from the summary target users' recent posts

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

use super::client::SearchMode;
use super::format::format_timestamp;
use super::splitter::truncate_to_complete_sentence;
use super::TwitterRuntime;
use crate::ai::parse::{parse_json_object, remove_quotes};
use crate::ids;
use crate::memory::{cache_get_as, cache_set_as};
use crate::models::{MemoryRecord, Post, ResponseAction};
use crate::templates::{compose_context, TemplateState, TWITTER_SUMMARY_TEMPLATE};

/// Posts fetched per summary target
const TARGET_POST_LIMIT: usize = 10;

/// Own posts shown to the model as history
const HISTORY_LIMIT: usize = 10;

/// Only posts younger than this are summarised
const SUMMARY_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Last summary run, cached per account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSummary {
    #[serde(default)]
    pub id: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl LastSummary {
    pub fn cache_key(username: &str) -> String {
        format!("twitter/{}/lastSummary", username)
    }
}

/// Room all summary posts are remembered in
pub fn summary_room_id(username: &str) -> uuid::Uuid {
    ids::string_to_uuid(&format!("twitter_generate_room-{}", username))
}

pub fn random_delay_minutes(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Model output to post text: the `text` field of a JSON answer if there is
/// one, literal `\n` turned into paragraph breaks, enclosing quotes removed
pub fn extract_summary_text(raw: &str) -> String {
    let text = parse_json_object(raw)
        .and_then(|obj| obj.get("text").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| raw.trim().to_string());

    remove_quotes(&text.replace("\\n", "\n\n"))
}

/// Numbered `{n}. {username}: {text}` list of recent target posts
pub fn format_target_list(posts: &[Post]) -> String {
    posts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}: {}\n", i + 1, p.username, p.text))
        .collect()
}

/// Numbered, timestamped list of the agent's own posts
pub fn format_history(posts: &[Post]) -> String {
    posts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "{}.({}) {}: {}\n",
                i + 1,
                format_timestamp(p.timestamp),
                p.username,
                p.text
            )
        })
        .collect()
}

async fn load_last_summary(rt: &TwitterRuntime) -> Option<LastSummary> {
    match cache_get_as(rt.store.as_ref(), &LastSummary::cache_key(rt.username())).await {
        Ok(last) => last,
        Err(e) => {
            log::warn!("Twitter: Could not read last summary: {}", e);
            None
        }
    }
}

async fn save_last_summary(rt: &TwitterRuntime, id: Option<String>) {
    let last = LastSummary {
        id,
        timestamp: chrono::Utc::now().timestamp_millis(),
    };
    if let Err(e) = cache_set_as(rt.store.as_ref(), &LastSummary::cache_key(rt.username()), &last).await {
        log::error!("Twitter: Failed to cache last summary: {}", e);
    }
}

/// Whether `delay_minutes` have passed since the last summary
pub async fn summary_due(rt: &TwitterRuntime, delay_minutes: u64) -> bool {
    let last = load_last_summary(rt).await.map(|l| l.timestamp).unwrap_or(0);
    chrono::Utc::now().timestamp_millis() > last + (delay_minutes as i64) * 60_000
}

async fn collect_target_posts(rt: &TwitterRuntime) -> Vec<Post> {
    let cutoff = chrono::Utc::now().timestamp() - SUMMARY_WINDOW_SECS;
    let mut posts = Vec::new();

    for username in &rt.config.summary_target_users {
        let query = format!("from:{}", username);
        match rt
            .client
            .fetch_search_posts(&query, TARGET_POST_LIMIT, SearchMode::Latest)
            .await
        {
            Ok(found) => posts.extend(found.into_iter().filter(|p| p.timestamp > cutoff)),
            Err(e) => log::warn!("Twitter: Error fetching posts from @{}: {}", username, e),
        }
    }

    posts
}

/// Publish long text as one post when possible, otherwise a truncated
/// standard post
async fn publish_summary(rt: &TwitterRuntime, text: &str) -> Result<Post, String> {
    let max_len = rt.config.max_tweet_length;

    if text.chars().count() > max_len {
        match rt.client.publish_long(text, None).await {
            Ok(Some(post)) => return Ok(post),
            Ok(None) => log::warn!("Twitter: Long post returned nothing, falling back"),
            Err(e) => log::warn!("Twitter: Long post failed, falling back: {}", e),
        }
        let truncated = truncate_to_complete_sentence(text, max_len);
        return rt
            .client
            .publish(&truncated, None, &[])
            .await?
            .ok_or_else(|| "No post returned for summary".to_string());
    }

    rt.client
        .publish(text, None, &[])
        .await?
        .ok_or_else(|| "No post returned for summary".to_string())
}

/// Generate and publish one summary. `Ok(None)` when there was nothing to
/// post or the run was dry.
pub async fn post_summary(rt: &TwitterRuntime) -> Result<Option<Post>, String> {
    let targets = collect_target_posts(rt).await;
    if targets.is_empty() {
        log::info!("Twitter: No recent posts to summarize");
        return Ok(None);
    }

    let history = match rt.client.fetch_user_posts(rt.username(), HISTORY_LIMIT).await {
        Ok(posts) => format_history(&posts),
        Err(e) => {
            log::warn!("Twitter: Could not load own post history: {}", e);
            String::new()
        }
    };

    let mut state = TemplateState::new();
    state.insert("agentName", rt.agent_name.clone());
    state.insert("twitterUserName", rt.username().to_string());
    state.insert("maxTweetLength", rt.config.max_tweet_length.to_string());
    state.insert("historyTweets", history);
    state.insert("summaryTargetTweetList", format_target_list(&targets));

    let context = compose_context(TWITTER_SUMMARY_TEMPLATE, &state);
    let raw = rt
        .ai
        .generate_text(&context)
        .await
        .map_err(|e| format!("Failed to generate summary: {}", e))?;

    let text = extract_summary_text(&raw);
    if text.is_empty() {
        log::warn!("Twitter: Generated summary is empty");
        return Ok(None);
    }

    if rt.config.dry_run {
        log::info!("Twitter: Dry run: would have posted summary:\n{}", text);
        return Ok(None);
    }

    let post = publish_summary(rt, &text).await?;
    log::info!("Twitter: Summary posted: {}", post.permanent_url);

    let mut record = MemoryRecord::from_own_post(&post, &rt.agent_id, ResponseAction::None);
    record.room_id = summary_room_id(rt.username());
    record.content.text = text;
    if let Err(e) = rt.store.create_memory(&record).await {
        log::error!("Twitter: Failed to save summary memory: {}", e);
    }

    save_last_summary(rt, Some(post.id.clone())).await;
    Ok(Some(post))
}

async fn run_summary(rt: &TwitterRuntime) {
    let id = match post_summary(rt).await {
        Ok(post) => post.map(|p| p.id),
        Err(e) => {
            log::error!("Twitter: Error posting summary: {}", e);
            None
        }
    };
    if id.is_none() {
        // Count the attempt so the next one waits a full interval
        save_last_summary(rt, None).await;
    }
}

pub async fn start_summary_loop(rt: TwitterRuntime, mut shutdown_rx: oneshot::Receiver<()>) {
    let (min, max) = (rt.config.summary_interval_min, rt.config.summary_interval_max);
    log::info!(
        "Twitter: Starting summary loop for {:?}, interval={}-{} min",
        rt.config.summary_target_users,
        min,
        max
    );

    if rt.config.post_immediately {
        run_summary(&rt).await;
    }

    loop {
        let delay = random_delay_minutes(min, max);
        if summary_due(&rt, delay).await {
            run_summary(&rt).await;
        }
        log::info!("Twitter: Next summary check in {} minutes", delay);

        tokio::select! {
            _ = &mut shutdown_rx => {
                log::info!("Twitter summary loop received shutdown signal");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(delay * 60)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockCompletion;
    use crate::twitter::mock::{self, MockPlatform, PublishOutcome};

    fn summary_config() -> crate::config::TwitterConfig {
        let mut config = mock::test_config();
        config.summary_target_users = vec!["defillama".to_string()];
        config
    }

    #[test]
    fn test_extract_summary_text() {
        assert_eq!(
            extract_summary_text(r#"{"text": "\"$CFX up\\nGood week\""}"#),
            "$CFX up\n\nGood week"
        );
        assert_eq!(extract_summary_text("  plain summary  "), "plain summary");
    }

    #[test]
    fn test_list_formats() {
        let mut a = mock::post("1", "alice", "first", None);
        a.timestamp = 1_717_243_200;
        let b = mock::post("2", "bob", "second", None);
        assert_eq!(format_target_list(&[a.clone(), b]), "1. alice: first\n2. bob: second\n");
        assert_eq!(format_history(&[a]), "1.(Jun 1, 12:00 PM) alice: first\n");
    }

    #[test]
    fn test_random_delay_bounds() {
        assert_eq!(random_delay_minutes(90, 90), 90);
        assert_eq!(random_delay_minutes(90, 10), 90);
        for _ in 0..50 {
            let d = random_delay_minutes(90, 180);
            assert!((90..=180).contains(&d));
        }
    }

    #[tokio::test]
    async fn test_posts_summary_of_recent_posts() {
        let platform = MockPlatform::new();
        let mut stale = mock::post("60", "defillama", "old news", None);
        stale.timestamp -= SUMMARY_WINDOW_SECS;
        platform.set_search(
            "from:defillama",
            Ok(vec![mock::post("61", "defillama", "TVL on Conflux doubled", None), stale]),
        );
        let ai = MockCompletion::with_texts(&["$CFX TVL doubled this week."]);
        let (rt, db) = mock::runtime_with(summary_config(), &platform, &ai);

        let post = post_summary(&rt).await.unwrap().unwrap();
        assert_eq!(post.text, "$CFX TVL doubled this week.");

        let prompt = &ai.calls()[0].1;
        assert!(prompt.contains("1. defillama: TVL on Conflux doubled\n"));
        assert!(!prompt.contains("old news"));

        let record = db
            .get_memory(&ids::memory_id(&post.id, &rt.agent_id))
            .unwrap()
            .unwrap();
        assert_eq!(record.room_id, summary_room_id("confi"));

        let last: LastSummary = cache_get_as(rt.store.as_ref(), "twitter/confi/lastSummary")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.id.as_deref(), Some(post.id.as_str()));
        assert!(!summary_due(&rt, 90).await);
    }

    #[tokio::test]
    async fn test_no_targets_skips_generation() {
        let platform = MockPlatform::new();
        let ai = MockCompletion::default();
        let (rt, _db) = mock::runtime_with(summary_config(), &platform, &ai);

        assert_eq!(post_summary(&rt).await.unwrap(), None);
        assert!(ai.calls().is_empty());
    }

    #[tokio::test]
    async fn test_long_summary_uses_long_post() {
        let platform = MockPlatform::new();
        platform.set_search("from:defillama", Ok(vec![mock::post("62", "defillama", "news", None)]));
        let ai = MockCompletion::with_texts(&["One sentence here. Another sentence follows."]);
        let mut config = summary_config();
        config.max_tweet_length = 20;
        let (rt, _db) = mock::runtime_with(config, &platform, &ai);

        post_summary(&rt).await.unwrap().unwrap();
        let published = platform.published();
        assert!(published[0].long);
        assert_eq!(published[0].text, "One sentence here. Another sentence follows.");
    }

    #[tokio::test]
    async fn test_long_post_failure_falls_back_to_truncated() {
        let platform = MockPlatform::new();
        platform.set_search("from:defillama", Ok(vec![mock::post("63", "defillama", "news", None)]));
        platform.fail_publish(0, PublishOutcome::Error("not allowed".to_string()));
        let ai = MockCompletion::with_texts(&["One sentence here. Another sentence follows."]);
        let mut config = summary_config();
        config.max_tweet_length = 20;
        let (rt, _db) = mock::runtime_with(config, &platform, &ai);

        let post = post_summary(&rt).await.unwrap().unwrap();
        assert_eq!(post.text, "One sentence here.");
        assert!(!platform.published()[0].long);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_publish() {
        let platform = MockPlatform::new();
        platform.set_search("from:defillama", Ok(vec![mock::post("64", "defillama", "news", None)]));
        let ai = MockCompletion::with_texts(&["summary"]);
        let mut config = summary_config();
        config.dry_run = true;
        let (rt, _db) = mock::runtime_with(config, &platform, &ai);

        assert_eq!(post_summary(&rt).await.unwrap(), None);
        assert!(platform.published().is_empty());
    }
}
