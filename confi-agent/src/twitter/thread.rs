//! Reply-thread reconstruction

use std::collections::HashSet;

use super::TwitterRuntime;
use crate::ids;
use crate::models::{MemoryRecord, Post};

/// Walk reply-to links back from `post` and return the chain root first.
///
/// Every post visited gets a memory record if it does not have one yet. A
/// parent that cannot be fetched ends the chain there.
pub async fn build_conversation_thread(
    post: &Post,
    rt: &TwitterRuntime,
    max_depth: usize,
) -> Vec<Post> {
    let mut thread: Vec<Post> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = post.clone();
    let mut depth = 0;

    loop {
        if depth >= max_depth {
            log::debug!("Twitter: Reached max thread depth {}", max_depth);
            break;
        }

        remember_post(&current, rt).await;

        if !visited.insert(current.id.clone()) {
            log::debug!("Twitter: Post {} already in thread, stopping", current.id);
            break;
        }

        let parent_id = current.in_reply_to_id.clone();
        thread.push(current);

        let Some(parent_id) = parent_id else {
            break;
        };

        match rt.client.fetch_post(&parent_id).await {
            Ok(Some(parent)) => {
                current = parent;
                depth += 1;
            }
            Ok(None) => {
                log::debug!("Twitter: Parent post {} not found", parent_id);
                break;
            }
            Err(e) => {
                log::warn!("Twitter: Failed to fetch parent post {}: {}", parent_id, e);
                break;
            }
        }
    }

    // Collected newest first
    thread.reverse();
    thread
}

/// Create the post's memory record unless it already exists
pub async fn remember_post(post: &Post, rt: &TwitterRuntime) {
    let memory_id = ids::memory_id(&post.id, &rt.agent_id);
    match rt.store.get_memory_by_id(&memory_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let record = MemoryRecord::from_post(post, &rt.agent_id, rt.own_user_id());
            if let Err(e) = rt.store.create_memory(&record).await {
                log::error!("Twitter: Failed to save thread post {}: {}", post.id, e);
            }
        }
        Err(e) => log::error!("Twitter: Memory lookup for post {} failed: {}", post.id, e),
    }
}
