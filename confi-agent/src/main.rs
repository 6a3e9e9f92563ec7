use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

mod actions;
mod ai;
mod config;
mod db;
mod ids;
mod memory;
mod models;
mod templates;
mod twitter;
mod web3;

use actions::{ActionRegistry, CreateMemeAction, DailyLimiter, RecommendAction};
use ai::OpenAIClient;
use config::Config;
use db::Database;
use twitter::pipeline::ResponsePipeline;
use twitter::{TwitterApiClient, TwitterRuntime};
use web3::{EthersTokenLauncher, SubgraphClient};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env()?;
    log::info!(
        "Starting agent {} ({}) as @{}",
        config.agent_name,
        config.agent_id,
        config.twitter.username
    );

    let db = Arc::new(
        Database::new(&config.database_url)
            .map_err(|e| format!("Failed to open database {}: {}", config.database_url, e))?,
    );
    log::info!("Database initialized at {}", config.database_url);

    let ai: Arc<dyn ai::CompletionService> = Arc::new(OpenAIClient::new(&config.ai)?);

    let client = TwitterApiClient::new(
        config.twitter.credentials.clone(),
        config.twitter.user_id.clone(),
        config.twitter.username.clone(),
    )?;
    let username = client
        .verify_credentials()
        .await
        .map_err(|e| format!("Twitter: Invalid credentials: {}", e))?;
    log::info!("Twitter: Credentials validated for @{}", username);

    if config.twitter.dry_run {
        log::info!("Twitter: Dry run mode, nothing will be published");
    }

    let rt = TwitterRuntime {
        agent_id: config.agent_id,
        agent_name: config.agent_name.clone(),
        config: Arc::new(config.twitter.clone()),
        client: Arc::new(client),
        store: db.clone(),
        ai: ai.clone(),
        mark_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    let mut registry = ActionRegistry::new();
    if config.meme.launch_configured() {
        match EthersTokenLauncher::new(&config.meme) {
            Ok(launcher) => {
                let limiter = DailyLimiter::new(db.clone(), config.meme.daily_limit);
                registry.register(Arc::new(CreateMemeAction::new(
                    config.meme.clone(),
                    ai.clone(),
                    Arc::new(launcher),
                    limiter,
                )));
            }
            Err(e) => log::error!("[CREATE_MEME] Token launcher unavailable: {}", e),
        }
    } else {
        log::info!("[CREATE_MEME] Conflux settings incomplete, meme creation disabled");
    }

    match config.meme.subgraph_url.as_deref() {
        Some(url) => match SubgraphClient::new(url) {
            Ok(subgraph) => registry.register(Arc::new(RecommendAction::new(
                Arc::new(subgraph),
                ai.clone(),
                config.meme.confi_pump_url.clone(),
            ))),
            Err(e) => log::error!("[RECOMMEND] Subgraph client unavailable: {}", e),
        },
        None => log::info!("[RECOMMEND] CONFLUX_MEME_SUBGRAPH_URL not set, recommendations disabled"),
    }
    let registry = Arc::new(registry);

    let mut shutdowns: Vec<oneshot::Sender<()>> = Vec::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let (tx, rx) = oneshot::channel();
    let pipeline = ResponsePipeline::for_interactions(rt.clone(), registry.clone());
    handles.push(tokio::spawn(twitter::interactions::start_interaction_loop(pipeline, rx)));
    shutdowns.push(tx);

    if !rt.config.quote_target_users.is_empty() {
        let (tx, rx) = oneshot::channel();
        let pipeline = ResponsePipeline::for_quotes(rt.clone(), registry.clone());
        handles.push(tokio::spawn(twitter::quote::start_quote_loop(pipeline, rx)));
        shutdowns.push(tx);
    }

    if !rt.config.summary_target_users.is_empty() {
        let (tx, rx) = oneshot::channel();
        handles.push(tokio::spawn(twitter::summary::start_summary_loop(rt.clone(), rx)));
        shutdowns.push(tx);
    }

    if rt.config.enable_follow {
        let (tx, rx) = oneshot::channel();
        handles.push(tokio::spawn(twitter::follow::start_follow_loop(rt.clone(), rx)));
        shutdowns.push(tx);
    }

    log::info!("Started {} Twitter task(s)", handles.len());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;
    log::info!("Shutdown signal received, stopping Twitter tasks");

    for tx in shutdowns {
        let _ = tx.send(());
    }
    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("Twitter task ended abnormally: {}", e);
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}
