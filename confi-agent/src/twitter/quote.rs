//! Quote posts of the quote target users

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};

use super::dedup::HighWaterMark;
use super::interactions::{fetch_user_candidates, process_candidates};
use super::pipeline::ResponsePipeline;

/// Posts fetched per quote target
const QUOTE_SEARCH_LIMIT: usize = 10;

/// One quote cycle; shares the high-water mark with the interaction client
pub async fn run_quote_cycle(pipeline: &ResponsePipeline) -> usize {
    let rt = pipeline.runtime();
    let users = &rt.config.quote_target_users;
    if users.is_empty() {
        return 0;
    }

    log::info!("Twitter: Checking {} quote target(s)", users.len());
    let mut mark = HighWaterMark::load(rt).await;
    let candidates = fetch_user_candidates(rt, users, QUOTE_SEARCH_LIMIT, &mark).await;

    let handled = process_candidates(pipeline, candidates, &mut mark).await;
    mark.save(rt).await;
    handled
}

pub async fn start_quote_loop(pipeline: ResponsePipeline, mut shutdown_rx: oneshot::Receiver<()>) {
    let poll_secs = pipeline.runtime().config.poll_interval_secs;
    log::info!(
        "Twitter: Starting quote loop for {:?}, poll_interval={}s",
        pipeline.runtime().config.quote_target_users,
        poll_secs
    );

    let mut poll_interval = interval(Duration::from_secs(poll_secs));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                log::info!("Twitter quote loop received shutdown signal");
                break;
            }
            _ = poll_interval.tick() => {
                let handled = run_quote_cycle(&pipeline).await;
                if handled > 0 {
                    log::info!("Twitter: Quoted {} post(s)", handled);
                }
            }
        }
    }
}
