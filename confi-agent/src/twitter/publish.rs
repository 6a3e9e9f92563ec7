//! Publishing generated text as a chain of posts

use std::time::Duration;

use rand::Rng;

use super::splitter::split_tweet_content;
use super::TwitterRuntime;
use crate::ids;
use crate::models::{MediaItem, MemoryRecord, Post, ResponseAction};

/// How the first chunk attaches to the triggering post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    Reply,
    Quote,
}

/// Random pause within the configured chunk delay bounds
pub async fn chunk_pause(bounds: (u64, u64)) {
    let (min, max) = bounds;
    if max == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(min..=max);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Split `text` and publish the chunks in order, each replying to the one
/// before it. Returns the posts that were actually created; a failed chunk is
/// logged and skipped, and the next chunk replies to the last success.
pub async fn send_post_chain(
    rt: &TwitterRuntime,
    text: &str,
    trigger: &Post,
    mode: ChainMode,
    attachments: &[MediaItem],
) -> Vec<Post> {
    let chunks = split_tweet_content(text, rt.config.max_tweet_length);
    let mut sent: Vec<Post> = Vec::new();
    let mut previous_id = trigger.id.clone();

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            chunk_pause(rt.config.chunk_delay_ms).await;
        }

        let chunk = chunk.trim();
        let result = if i == 0 && mode == ChainMode::Quote {
            rt.client.publish_quote(chunk, &trigger.id).await
        } else {
            let media: &[MediaItem] = if i == 0 { attachments } else { &[] };
            rt.client.publish(chunk, Some(&previous_id), media).await
        };

        match result {
            Ok(Some(post)) => {
                log::info!("Twitter: Sent chunk {}/{} as {}", i + 1, chunks.len(), post.id);
                previous_id = post.id.clone();
                sent.push(post);
            }
            Ok(None) => {
                log::error!("Twitter: Error sending chunk {:?}: no post returned", chunk);
            }
            Err(e) => {
                log::error!("Twitter: Error sending chunk {:?}: {}", chunk, e);
            }
        }
    }

    sent
}

/// Store memories for the published chunks in the trigger's room. All but
/// the last are tagged CONTINUE; the last carries `final_action`.
pub async fn remember_published(
    rt: &TwitterRuntime,
    sent: &[Post],
    trigger: &Post,
    final_action: ResponseAction,
) -> Vec<MemoryRecord> {
    let room_id = ids::room_id(trigger.conversation(), &rt.agent_id);
    let mut records = Vec::with_capacity(sent.len());

    for (i, post) in sent.iter().enumerate() {
        let action = if i + 1 == sent.len() {
            final_action
        } else {
            ResponseAction::Continue
        };
        let mut record = MemoryRecord::from_own_post(post, &rt.agent_id, action);
        record.room_id = room_id;

        if let Err(e) = rt.store.create_memory(&record).await {
            log::error!("Twitter: Failed to save sent post {}: {}", post.id, e);
            continue;
        }
        records.push(record);
    }

    records
}
