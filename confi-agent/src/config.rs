use crate::ids::string_to_uuid;
use crate::twitter::oauth::TwitterCredentials;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const AGENT_NAME: &str = "AGENT_NAME";
    pub const AGENT_ID: &str = "AGENT_ID";
    pub const DATABASE_URL: &str = "DATABASE_URL";

    pub const TWITTER_USERNAME: &str = "TWITTER_USERNAME";
    pub const TWITTER_USER_ID: &str = "TWITTER_USER_ID";
    pub const TWITTER_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
    pub const TWITTER_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
    pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
    pub const TWITTER_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
    pub const TWITTER_DRY_RUN: &str = "TWITTER_DRY_RUN";
    pub const TWITTER_POLL_INTERVAL: &str = "TWITTER_POLL_INTERVAL";
    pub const TWITTER_TARGET_USERS: &str = "TWITTER_TARGET_USERS";
    pub const TWITTER_QUOTE_TARGET_USERS: &str = "TWITTER_QUOTE_TARGET_USERS";
    pub const TWITTER_SUMMARY_TARGET_USERS: &str = "TWITTER_SUMMARY_TARGET_USERS";
    pub const TWITTER_MAX_THREAD_DEPTH: &str = "TWITTER_MAX_THREAD_DEPTH";
    pub const TWITTER_CHUNK_DELAY_MS: &str = "TWITTER_CHUNK_DELAY_MS";
    pub const TWITTER_QUOTE_SHOULD_RESPOND: &str = "TWITTER_QUOTE_SHOULD_RESPOND";
    pub const MAX_TWEET_LENGTH: &str = "MAX_TWEET_LENGTH";
    pub const POST_SUMMARY_INTERVAL_MIN: &str = "POST_SUMMARY_INTERVAL_MIN";
    pub const POST_SUMMARY_INTERVAL_MAX: &str = "POST_SUMMARY_INTERVAL_MAX";
    pub const POST_IMMEDIATELY: &str = "POST_IMMEDIATELY";
    pub const ENABLE_FOLLOW: &str = "ENABLE_FOLLOW";
    pub const CONFI_PUMP_HASHTAG: &str = "CONFLUX_CONFI_PUMP_HASHTAG";
    pub const CONFI_PUMP_URL: &str = "CONFLUX_CONFI_PUMP_URL";

    pub const AI_ENDPOINT: &str = "AI_ENDPOINT";
    pub const AI_API_KEY: &str = "AI_API_KEY";
    pub const AI_MODEL_SMALL: &str = "AI_MODEL_SMALL";
    pub const AI_MODEL_LARGE: &str = "AI_MODEL_LARGE";
    pub const AI_MAX_TOKENS: &str = "AI_MAX_TOKENS";

    pub const MEME_RESTRICTION: &str = "CONFLUX_MEME_CREATE_TWITTER_RESTRICTION";
    pub const MEME_DAILY_LIMIT: &str = "CONFLUX_MEME_CREATE_TWITTER_RESTRICTION_DAILY_LIMIT";
    pub const MEME_MIN_FOLLOWERS: &str = "CONFLUX_MEME_CREATE_TWITTER_RESTRICTION_MIN_FOLLOWERS";
    pub const MEME_MIN_CREATED_DAYS: &str =
        "CONFLUX_MEME_CREATE_TWITTER_RESTRICTION_MIN_CREATED_DAY_PERIOD";
    pub const CONFLUX_IS_TESTNET: &str = "CONFLUX_IS_TESTNET";
    pub const CONFLUX_RPC_URL: &str = "CONFLUX_ESPACE_RPC_URL";
    pub const CONFLUX_PRIVATE_KEY: &str = "CONFLUX_ESPACE_PRIVATE_KEY";
    pub const MEME_CONTRACT_ADDRESS: &str = "CONFLUX_MEME_CONTRACT_ADDRESS";
    pub const MEME_ABI_PATH: &str = "CONFLUX_MEME_ABI_PATH";
    pub const HELPER_URL: &str = "CONFLUX_ELIZA_HELPER_URL";
    pub const MEME_SUBGRAPH_URL: &str = "CONFLUX_MEME_SUBGRAPH_URL";
}

/// Default values
pub mod defaults {
    pub const AGENT_NAME: &str = "confi";
    pub const DATABASE_URL: &str = "./.db/confi.db";
    pub const POLL_INTERVAL_SECS: u64 = 120;
    pub const MAX_THREAD_DEPTH: usize = 10;
    pub const MAX_TWEET_LENGTH: usize = 280;
    pub const CHUNK_DELAY_MS: (u64, u64) = (1000, 2000);
    pub const SUMMARY_INTERVAL_MIN: u64 = 90;
    pub const SUMMARY_INTERVAL_MAX: u64 = 180;
    pub const AI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
    pub const AI_MODEL_SMALL: &str = "gpt-4o-mini";
    pub const AI_MODEL_LARGE: &str = "gpt-4o";
    pub const AI_MAX_TOKENS: u32 = 1024;
    pub const MEME_DAILY_LIMIT: u32 = 1;
    pub const MEME_ABI_PATH: &str = "abis/meme.json";
}

/// Minimum poll interval in seconds (platform rate limit protection)
const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Returns the absolute path to the confi-agent crate directory.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Key/value source the config is read from (process env in production).
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn get_string(lookup: Lookup, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_required(lookup: Lookup, key: &str) -> Result<String, String> {
    get_string(lookup, key).ok_or_else(|| format!("{} not configured", key))
}

fn get_bool(lookup: Lookup, key: &str) -> bool {
    get_string(lookup, key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

fn get_parsed<T: FromStr>(lookup: Lookup, key: &str, default: T) -> T {
    match get_string(lookup, key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Config: could not parse {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

/// Comma-separated usernames; leading `@` is dropped.
fn get_list(lookup: Lookup, key: &str) -> Vec<String> {
    get_string(lookup, key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().trim_start_matches('@').to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a `min-max` millisecond range such as `1000-2000`.
fn parse_range(raw: &str) -> Option<(u64, u64)> {
    let (min, max) = raw.split_once('-')?;
    let min: u64 = min.trim().parse().ok()?;
    let max: u64 = max.trim().parse().ok()?;
    Some((min.min(max), min.max(max)))
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub username: String,
    /// The agent's own platform user id
    pub user_id: String,
    pub credentials: TwitterCredentials,
    pub dry_run: bool,
    pub poll_interval_secs: u64,
    pub target_users: Vec<String>,
    pub quote_target_users: Vec<String>,
    pub summary_target_users: Vec<String>,
    pub max_thread_depth: usize,
    pub max_tweet_length: usize,
    /// Jitter bounds between chained publishes, in milliseconds
    pub chunk_delay_ms: (u64, u64),
    pub quote_should_respond: bool,
    pub summary_interval_min: u64,
    pub summary_interval_max: u64,
    pub post_immediately: bool,
    pub enable_follow: bool,
    pub confi_pump_hashtag: String,
    pub confi_pump_url: String,
}

impl TwitterConfig {
    pub fn from_lookup(lookup: Lookup) -> Result<Self, String> {
        let username = get_required(lookup, env_vars::TWITTER_USERNAME)?
            .trim_start_matches('@')
            .to_string();
        let user_id = get_required(lookup, env_vars::TWITTER_USER_ID)?;

        let credentials = TwitterCredentials::new(
            get_required(lookup, env_vars::TWITTER_CONSUMER_KEY)?,
            get_required(lookup, env_vars::TWITTER_CONSUMER_SECRET)?,
            get_required(lookup, env_vars::TWITTER_ACCESS_TOKEN)?,
            get_required(lookup, env_vars::TWITTER_ACCESS_TOKEN_SECRET)?,
        );

        let summary_interval_min = get_parsed(
            lookup,
            env_vars::POST_SUMMARY_INTERVAL_MIN,
            defaults::SUMMARY_INTERVAL_MIN,
        );
        let summary_interval_max = get_parsed(
            lookup,
            env_vars::POST_SUMMARY_INTERVAL_MAX,
            defaults::SUMMARY_INTERVAL_MAX,
        )
        .max(summary_interval_min);

        Ok(Self {
            username,
            user_id,
            credentials,
            dry_run: get_bool(lookup, env_vars::TWITTER_DRY_RUN),
            poll_interval_secs: get_parsed(
                lookup,
                env_vars::TWITTER_POLL_INTERVAL,
                defaults::POLL_INTERVAL_SECS,
            )
            .max(MIN_POLL_INTERVAL_SECS),
            target_users: get_list(lookup, env_vars::TWITTER_TARGET_USERS),
            quote_target_users: get_list(lookup, env_vars::TWITTER_QUOTE_TARGET_USERS),
            summary_target_users: get_list(lookup, env_vars::TWITTER_SUMMARY_TARGET_USERS),
            max_thread_depth: get_parsed(
                lookup,
                env_vars::TWITTER_MAX_THREAD_DEPTH,
                defaults::MAX_THREAD_DEPTH,
            ),
            max_tweet_length: get_parsed(
                lookup,
                env_vars::MAX_TWEET_LENGTH,
                defaults::MAX_TWEET_LENGTH,
            )
            .max(1),
            chunk_delay_ms: get_string(lookup, env_vars::TWITTER_CHUNK_DELAY_MS)
                .and_then(|raw| parse_range(&raw))
                .unwrap_or(defaults::CHUNK_DELAY_MS),
            quote_should_respond: get_bool(lookup, env_vars::TWITTER_QUOTE_SHOULD_RESPOND),
            summary_interval_min,
            summary_interval_max,
            post_immediately: get_bool(lookup, env_vars::POST_IMMEDIATELY),
            enable_follow: get_bool(lookup, env_vars::ENABLE_FOLLOW),
            confi_pump_hashtag: get_string(lookup, env_vars::CONFI_PUMP_HASHTAG)
                .unwrap_or_default(),
            confi_pump_url: get_string(lookup, env_vars::CONFI_PUMP_URL).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model_small: String,
    pub model_large: String,
    pub max_tokens: u32,
}

impl AiConfig {
    pub fn from_lookup(lookup: Lookup) -> Self {
        Self {
            endpoint: get_string(lookup, env_vars::AI_ENDPOINT)
                .unwrap_or_else(|| defaults::AI_ENDPOINT.to_string()),
            api_key: get_string(lookup, env_vars::AI_API_KEY).unwrap_or_default(),
            model_small: get_string(lookup, env_vars::AI_MODEL_SMALL)
                .unwrap_or_else(|| defaults::AI_MODEL_SMALL.to_string()),
            model_large: get_string(lookup, env_vars::AI_MODEL_LARGE)
                .unwrap_or_else(|| defaults::AI_MODEL_LARGE.to_string()),
            max_tokens: get_parsed(lookup, env_vars::AI_MAX_TOKENS, defaults::AI_MAX_TOKENS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemeConfig {
    pub restriction_enabled: bool,
    pub daily_limit: u32,
    pub min_followers: u64,
    pub min_account_age_days: u64,
    pub is_testnet: bool,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub contract_address: Option<String>,
    pub abi_path: PathBuf,
    pub helper_url: Option<String>,
    pub confi_pump_url: String,
    /// Enables the RECOMMEND action
    pub subgraph_url: Option<String>,
}

impl MemeConfig {
    pub fn from_lookup(lookup: Lookup) -> Self {
        let abi_path = get_string(lookup, env_vars::MEME_ABI_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| backend_dir().join(defaults::MEME_ABI_PATH));

        Self {
            restriction_enabled: get_bool(lookup, env_vars::MEME_RESTRICTION),
            daily_limit: get_parsed(lookup, env_vars::MEME_DAILY_LIMIT, defaults::MEME_DAILY_LIMIT),
            min_followers: get_parsed(lookup, env_vars::MEME_MIN_FOLLOWERS, 0),
            min_account_age_days: get_parsed(lookup, env_vars::MEME_MIN_CREATED_DAYS, 0),
            is_testnet: get_bool(lookup, env_vars::CONFLUX_IS_TESTNET),
            rpc_url: get_string(lookup, env_vars::CONFLUX_RPC_URL),
            private_key: get_string(lookup, env_vars::CONFLUX_PRIVATE_KEY),
            contract_address: get_string(lookup, env_vars::MEME_CONTRACT_ADDRESS),
            abi_path,
            helper_url: get_string(lookup, env_vars::HELPER_URL),
            confi_pump_url: get_string(lookup, env_vars::CONFI_PUMP_URL).unwrap_or_default(),
            subgraph_url: get_string(lookup, env_vars::MEME_SUBGRAPH_URL),
        }
    }

    /// Token launching is only wired when the chain settings are complete
    pub fn launch_configured(&self) -> bool {
        self.rpc_url.is_some()
            && self.private_key.is_some()
            && self.contract_address.is_some()
            && self.helper_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub agent_name: String,
    pub agent_id: Uuid,
    pub database_url: String,
    pub twitter: TwitterConfig,
    pub ai: AiConfig,
    pub meme: MemeConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self, String> {
        let agent_name = get_string(lookup, env_vars::AGENT_NAME)
            .unwrap_or_else(|| defaults::AGENT_NAME.to_string());

        // An explicit AGENT_ID wins; otherwise the id is derived from the name
        // so it stays stable across restarts.
        let agent_id = match get_string(lookup, env_vars::AGENT_ID) {
            Some(raw) => Uuid::parse_str(&raw)
                .map_err(|e| format!("Invalid {}: {}", env_vars::AGENT_ID, e))?,
            None => string_to_uuid(&agent_name),
        };

        Ok(Self {
            agent_name,
            agent_id,
            database_url: get_string(lookup, env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            twitter: TwitterConfig::from_lookup(lookup)?,
            ai: AiConfig::from_lookup(lookup),
            meme: MemeConfig::from_lookup(lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TWITTER_USERNAME", "@confibot"),
            ("TWITTER_USER_ID", "1500"),
            ("TWITTER_CONSUMER_KEY", "ck"),
            ("TWITTER_CONSUMER_SECRET", "cs"),
            ("TWITTER_ACCESS_TOKEN", "at"),
            ("TWITTER_ACCESS_TOKEN_SECRET", "ats"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, String> {
        Config::from_lookup(&|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.twitter.username, "confibot");
        assert_eq!(config.twitter.poll_interval_secs, defaults::POLL_INTERVAL_SECS);
        assert_eq!(config.twitter.max_thread_depth, 10);
        assert_eq!(config.twitter.max_tweet_length, 280);
        assert_eq!(config.twitter.chunk_delay_ms, (1000, 2000));
        assert!(!config.twitter.dry_run);
        assert!(!config.twitter.quote_should_respond);
        assert!(config.twitter.target_users.is_empty());
        assert_eq!(config.agent_id, string_to_uuid("confi"));
        assert!(!config.meme.restriction_enabled);
        assert_eq!(config.meme.daily_limit, 1);
        assert!(!config.meme.launch_configured());
        assert_eq!(config.meme.subgraph_url, None);
    }

    #[test]
    fn test_subgraph_url_enables_recommendations() {
        let mut vars = base_env();
        vars.insert("CONFLUX_MEME_SUBGRAPH_URL", " https://graph.example/confipump ");
        let config = load(&vars).unwrap();
        assert_eq!(
            config.meme.subgraph_url.as_deref(),
            Some("https://graph.example/confipump")
        );
    }

    #[test]
    fn test_missing_credentials() {
        let mut vars = base_env();
        vars.remove("TWITTER_ACCESS_TOKEN");
        let err = load(&vars).unwrap_err();
        assert!(err.contains("TWITTER_ACCESS_TOKEN"));
    }

    #[test]
    fn test_lists_flags_and_ranges() {
        let mut vars = base_env();
        vars.insert("TWITTER_TARGET_USERS", " @alice, bob ,,carol");
        vars.insert("TWITTER_DRY_RUN", "TRUE");
        vars.insert("TWITTER_CHUNK_DELAY_MS", "0-0");
        vars.insert("TWITTER_POLL_INTERVAL", "5");
        vars.insert("POST_SUMMARY_INTERVAL_MIN", "60");
        vars.insert("POST_SUMMARY_INTERVAL_MAX", "30");
        vars.insert("MAX_TWEET_LENGTH", "not-a-number");

        let config = load(&vars).unwrap();
        assert_eq!(config.twitter.target_users, vec!["alice", "bob", "carol"]);
        assert!(config.twitter.dry_run);
        assert_eq!(config.twitter.chunk_delay_ms, (0, 0));
        assert_eq!(config.twitter.poll_interval_secs, MIN_POLL_INTERVAL_SECS);
        assert_eq!(config.twitter.summary_interval_max, 60);
        assert_eq!(config.twitter.max_tweet_length, 280);
    }

    #[test]
    fn test_explicit_agent_id() {
        let mut vars = base_env();
        vars.insert("AGENT_ID", "not-a-uuid");
        assert!(load(&vars).is_err());

        vars.insert("AGENT_ID", "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
        let config = load(&vars).unwrap();
        assert_eq!(
            config.agent_id.to_string(),
            "6ba7b810-9dad-11d1-80b4-00c04fd430c8"
        );
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("1000-2000"), Some((1000, 2000)));
        assert_eq!(parse_range("2000-1000"), Some((1000, 2000)));
        assert_eq!(parse_range("abc"), None);
    }
}
