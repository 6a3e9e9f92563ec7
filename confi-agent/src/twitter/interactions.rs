//! Mention and target-user polling

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};

use super::client::SearchMode;
use super::dedup::{is_processed, sort_candidates, HighWaterMark};
use super::pipeline::ResponsePipeline;
use super::thread::build_conversation_thread;
use super::TwitterRuntime;
use crate::models::Post;

/// Posts fetched per search
const SEARCH_LIMIT: usize = 20;

/// Target-user posts older than this are not answered
pub const MAX_CANDIDATE_AGE_SECS: i64 = 2 * 60 * 60;

/// Followed accounts considered per cycle
const FOLLOWING_LIMIT: usize = 100;

/// Original post (not a reply or repost) younger than the candidate age
pub fn is_recent_original(post: &Post, now: i64) -> bool {
    !post.is_reply && !post.is_retweet && now - post.timestamp < MAX_CANDIDATE_AGE_SECS
}

/// Configured target users plus the accounts the agent follows
async fn target_users(rt: &TwitterRuntime) -> Vec<String> {
    let mut users = rt.config.target_users.clone();

    match rt.client.following(rt.own_user_id(), FOLLOWING_LIMIT).await {
        Ok(following) => users.extend(following.into_iter().map(|p| p.username)),
        Err(e) => log::warn!("Twitter: Could not load followed accounts: {}", e),
    }

    let own = rt.username().to_lowercase();
    let mut seen = std::collections::HashSet::new();
    users.retain(|u| u.to_lowercase() != own && seen.insert(u.to_lowercase()));
    users
}

/// Recent original posts of each user; a failing user is logged and skipped
pub async fn fetch_user_candidates(
    rt: &TwitterRuntime,
    users: &[String],
    limit: usize,
    mark: &HighWaterMark,
) -> Vec<Post> {
    let now = chrono::Utc::now().timestamp();
    let mut candidates = Vec::new();

    for username in users {
        let query = format!("from:{}", username);
        match rt.client.fetch_search_posts(&query, limit, SearchMode::Latest).await {
            Ok(posts) => {
                let before = candidates.len();
                candidates.extend(
                    posts
                        .into_iter()
                        .filter(|p| is_recent_original(p, now) && mark.admits(&p.id)),
                );
                log::debug!(
                    "Twitter: {} candidate(s) from @{}",
                    candidates.len() - before,
                    username
                );
            }
            Err(e) => log::warn!("Twitter: Error fetching posts from @{}: {}", username, e),
        }
    }

    candidates
}

/// Sort, filter by the mark, skip processed posts, build threads and run the
/// pipeline on the rest. Returns how many posts went through the pipeline.
pub async fn process_candidates(
    pipeline: &ResponsePipeline,
    candidates: Vec<Post>,
    mark: &mut HighWaterMark,
) -> usize {
    let rt = pipeline.runtime();
    let mut handled = 0;

    for post in sort_candidates(candidates) {
        if !mark.admits(&post.id) {
            continue;
        }

        if is_processed(rt, &post.id).await {
            log::debug!("Twitter: Already processed post {}", post.id);
            mark.advance(&post.id);
            continue;
        }

        log::info!("Twitter: New post: {} from @{}", post.permanent_url, post.username);
        let thread = build_conversation_thread(&post, rt, rt.config.max_thread_depth).await;

        if let Some(decision) = pipeline.handle(&post, &thread).await {
            log::debug!(
                "Twitter: Post {} decided {} ({} published)",
                post.id,
                decision.should_respond.as_ref(),
                decision.published.len()
            );
            handled += 1;
        }
        mark.advance(&post.id);
    }

    handled
}

/// One interaction cycle. Only a failed mention search fails the cycle.
pub async fn run_interaction_cycle(pipeline: &mut ResponsePipeline) -> Result<usize, String> {
    let rt = pipeline.runtime().clone();
    log::info!("Twitter: Checking interactions for @{}", rt.username());

    let mut mark = HighWaterMark::load(&rt).await;

    let mentions = rt
        .client
        .fetch_search_posts(&format!("@{}", rt.username()), SEARCH_LIMIT, SearchMode::Latest)
        .await
        .map_err(|e| format!("Failed to fetch mentions: {}", e))?;

    let users = target_users(&rt).await;
    pipeline.set_priority_users(users.clone());

    let mut candidates = mentions;
    candidates.extend(fetch_user_candidates(&rt, &users, SEARCH_LIMIT, &mark).await);

    let handled = process_candidates(pipeline, candidates, &mut mark).await;
    mark.save(&rt).await;

    Ok(handled)
}

pub async fn start_interaction_loop(
    mut pipeline: ResponsePipeline,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let poll_secs = pipeline.runtime().config.poll_interval_secs;
    log::info!(
        "Twitter: Starting interaction loop for @{}, poll_interval={}s",
        pipeline.runtime().username(),
        poll_secs
    );

    let mut poll_interval = interval(Duration::from_secs(poll_secs));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                log::info!("Twitter interaction loop received shutdown signal");
                break;
            }
            _ = poll_interval.tick() => {
                match run_interaction_cycle(&mut pipeline).await {
                    Ok(0) => {}
                    Ok(handled) => log::info!("Twitter: Handled {} interaction(s)", handled),
                    Err(e) => log::error!("Twitter: Error handling interactions: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionRegistry;
    use crate::ai::MockCompletion;
    use crate::ids;
    use crate::models::{MemoryRecord, Profile};
    use crate::twitter::mock::{self, MockPlatform};
    use std::sync::Arc;

    fn pipeline(platform: &MockPlatform, ai: &MockCompletion) -> (ResponsePipeline, Arc<crate::db::Database>) {
        let (rt, db) = mock::runtime(platform, ai);
        (
            ResponsePipeline::for_interactions(rt, Arc::new(ActionRegistry::new())),
            db,
        )
    }

    fn following(username: &str) -> Profile {
        Profile {
            id: format!("uid-{}", username),
            username: username.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cycle_processes_mentions_in_id_order() {
        let platform = MockPlatform::new();
        platform.set_search(
            "@confi",
            Ok(vec![
                mock::post("5", "alice", "hey @confi", None),
                mock::post("2", "bob", "@confi gm", None),
                mock::post("9", "carol", "@confi wen", None),
            ]),
        );
        let ai = MockCompletion::with_texts(&["[IGNORE]", "[IGNORE]", "[IGNORE]"]);
        let (mut pipeline, db) = pipeline(&platform, &ai);

        let handled = run_interaction_cycle(&mut pipeline).await.unwrap();
        assert_eq!(handled, 3);

        // Prompts were built in ascending id order
        let calls = ai.calls();
        assert!(calls[0].1.contains("ID: 2"));
        assert!(calls[1].1.contains("ID: 5"));
        assert!(calls[2].1.contains("ID: 9"));

        let rt = pipeline.runtime();
        assert_eq!(HighWaterMark::load(rt).await.latest(), Some("9"));
        for id in ["2", "5", "9"] {
            assert!(db.get_memory(&ids::memory_id(id, &rt.agent_id)).unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_second_cycle_skips_seen_posts() {
        let platform = MockPlatform::new();
        platform.set_search("@confi", Ok(vec![mock::post("7", "alice", "@confi hi", None)]));
        let ai = MockCompletion::with_texts(&["[IGNORE]"]);
        let (mut pipeline, _db) = pipeline(&platform, &ai);

        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 1);
        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 0);
        assert_eq!(ai.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_filters_older_ids() {
        let platform = MockPlatform::new();
        platform.set_search(
            "@confi",
            Ok(vec![
                mock::post("3", "alice", "@confi old", None),
                mock::post("12", "bob", "@confi new", None),
            ]),
        );
        let ai = MockCompletion::with_texts(&["[IGNORE]"]);
        let (mut pipeline, _db) = pipeline(&platform, &ai);
        let mark = HighWaterMark::new(Some("10".to_string()));
        mark.save(pipeline.runtime()).await;

        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 1);
        assert_eq!(ai.calls().len(), 1);
        assert!(ai.calls()[0].1.contains("ID: 12"));
    }

    #[tokio::test]
    async fn test_processed_post_is_skipped_but_advances_mark() {
        let platform = MockPlatform::new();
        let post = mock::post("40", "alice", "@confi again", None);
        platform.set_search("@confi", Ok(vec![post.clone()]));
        let ai = MockCompletion::default();
        let (mut pipeline, _db) = pipeline(&platform, &ai);

        let rt = pipeline.runtime().clone();
        let record = MemoryRecord::from_post(&post, &rt.agent_id, rt.own_user_id());
        rt.store.create_memory(&record).await.unwrap();

        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 0);
        assert!(ai.calls().is_empty());
        assert_eq!(HighWaterMark::load(&rt).await.latest(), Some("40"));
    }

    #[tokio::test]
    async fn test_target_users_filters() {
        let platform = MockPlatform::new();
        let mut reply = mock::post("21", "bob", "a reply", Some("1"));
        reply.is_reply = true;
        let mut retweet = mock::post("22", "bob", "RT", None);
        retweet.is_retweet = true;
        let mut old = mock::post("23", "bob", "yesterday", None);
        old.timestamp -= MAX_CANDIDATE_AGE_SECS;
        let fresh = mock::post("24", "bob", "Conflux is shipping", None);
        platform.set_search("from:bob", Ok(vec![reply, retweet, old, fresh]));
        platform.set_following(vec![following("bob")]);

        let ai = MockCompletion::with_texts(&["[IGNORE]"]);
        let (mut pipeline, _db) = pipeline(&platform, &ai);

        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 1);
        assert!(ai.calls()[0].1.contains("ID: 24"));
        // Followed account is listed as a priority user
        assert!(ai.calls()[0].1.contains("always RESPOND to these accounts, whatever the topic: bob"));
    }

    #[tokio::test]
    async fn test_target_user_error_is_skipped() {
        let platform = MockPlatform::new();
        platform.set_search("from:bob", Err("rate limited".to_string()));
        platform.set_search("from:carol", Ok(vec![mock::post("30", "carol", "gm", None)]));
        let ai = MockCompletion::with_texts(&["[IGNORE]"]);
        let mut config = mock::test_config();
        config.target_users = vec!["bob".to_string(), "carol".to_string(), "confi".to_string()];
        let (rt, _db) = mock::runtime_with(config, &platform, &ai);
        let mut pipeline = ResponsePipeline::for_interactions(rt, Arc::new(ActionRegistry::new()));

        assert_eq!(run_interaction_cycle(&mut pipeline).await.unwrap(), 1);
        assert_eq!(platform.searches(), vec!["@confi", "from:bob", "from:carol"]);
    }

    #[tokio::test]
    async fn test_mention_search_failure_fails_cycle() {
        let platform = MockPlatform::new();
        platform.set_search("@confi", Err("503".to_string()));
        let (mut pipeline, _db) = pipeline(&platform, &MockCompletion::default());

        let err = run_interaction_cycle(&mut pipeline).await.unwrap_err();
        assert!(err.contains("503"));
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let platform = MockPlatform::new();
        let (pipeline, _db) = pipeline(&platform, &MockCompletion::default());
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(start_interaction_loop(pipeline, rx));
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
