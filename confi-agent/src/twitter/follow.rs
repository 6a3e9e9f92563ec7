//! Daily follow-back of verified followers

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};

use super::TwitterRuntime;
use crate::memory::{cache_get_as, cache_set_as};

const FOLLOW_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Followers and followed accounts fetched per run
const FOLLOW_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct BlacklistEntry {
    blacklisted: bool,
}

fn blacklist_key(user_id: &str) -> String {
    format!("twitter/blacklist/{}", user_id)
}

pub async fn blacklist_user(rt: &TwitterRuntime, user_id: &str) -> Result<(), String> {
    cache_set_as(
        rt.store.as_ref(),
        &blacklist_key(user_id),
        &BlacklistEntry { blacklisted: true },
    )
    .await
}

pub async fn is_blacklisted(rt: &TwitterRuntime, user_id: &str) -> bool {
    match cache_get_as::<BlacklistEntry>(rt.store.as_ref(), &blacklist_key(user_id)).await {
        Ok(entry) => entry.map(|e| e.blacklisted).unwrap_or(false),
        Err(e) => {
            log::warn!("Twitter: Blacklist lookup for {} failed: {}", user_id, e);
            false
        }
    }
}

/// Follow every blue-verified follower the agent does not follow yet.
/// Returns the user ids followed (or that would be, in dry run).
pub async fn run_follow_cycle(rt: &TwitterRuntime) -> Result<Vec<String>, String> {
    let followers = rt
        .client
        .followers(rt.own_user_id(), FOLLOW_LIST_LIMIT)
        .await
        .map_err(|e| format!("Failed to fetch followers: {}", e))?;
    let following: HashSet<String> = rt
        .client
        .following(rt.own_user_id(), FOLLOW_LIST_LIMIT)
        .await
        .map_err(|e| format!("Failed to fetch following: {}", e))?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut followed = Vec::new();
    for follower in followers {
        if !follower.is_blue_verified || following.contains(&follower.id) {
            continue;
        }
        if is_blacklisted(rt, &follower.id).await {
            log::debug!("Twitter: Not following blacklisted @{}", follower.username);
            continue;
        }

        if rt.config.dry_run {
            log::info!("Twitter: Dry run: would follow @{}", follower.username);
            followed.push(follower.id);
            continue;
        }

        log::info!("Twitter: Following @{}", follower.username);
        match rt.client.follow(&follower.id).await {
            Ok(()) => followed.push(follower.id),
            Err(e) => log::error!("Twitter: Failed to follow @{}: {}", follower.username, e),
        }
    }

    Ok(followed)
}

pub async fn start_follow_loop(rt: TwitterRuntime, mut shutdown_rx: oneshot::Receiver<()>) {
    log::info!("Twitter: Starting follow loop for @{}", rt.username());

    let mut follow_interval = interval(FOLLOW_INTERVAL);
    follow_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                log::info!("Twitter follow loop received shutdown signal");
                break;
            }
            _ = follow_interval.tick() => {
                match run_follow_cycle(&rt).await {
                    Ok(followed) => log::info!("Twitter: Followed {} account(s)", followed.len()),
                    Err(e) => log::error!("Twitter: Error in follow cycle: {}", e),
                }
            }
        }
    }
}
